#![allow(dead_code)]
//! In-memory stand-in for the machine's block layer. `FakeHost` keeps a flat
//! table of devices, builds lsblk-like trees from it on every listing, applies
//! the effect of each mutating call the way the kernel would, and records
//! every call for later inspection.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{bail, Error};

use osutils::lsblk::BlockDevice;
use storage_api::{config::RaidLevel, constants::PARTITION_ALIGNMENT_BYTES};

use crate::host::{
    ArrayRequest, BlockDeviceHost, FilesystemRequest, MountRequest, PartitionRequest,
};

/// Filesystem UUID assigned by the fake `mkfs`. Upper case, like some tools
/// report it.
pub const FAKE_FILESYSTEM_UUID: &str = "0F6E6F2C-2F0A-4C55-8D7B-6C1D7E3B9A10";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Settle,
    List(Option<PathBuf>),
    CreatePartition(PartitionRequest),
    CreateArray(ArrayRequest),
    IsBlockDevice(PathBuf),
    MakeFilesystem(FilesystemRequest),
    Mount(MountRequest),
    /// Inserted by tests to check ordering against host calls.
    Marker(String),
}

impl Call {
    /// Whether this call changes the device tree or the mount table.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::CreatePartition(_) | Call::CreateArray(_) | Call::MakeFilesystem(_) | Call::Mount(_)
        )
    }
}

/// Host operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    List,
    CreatePartition,
    CreateArray,
    MakeFilesystem,
    Mount,
}

#[derive(Debug, Clone)]
struct Node {
    /// Device attributes; `children` is always empty here.
    device: BlockDevice,
    parents: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct State {
    nodes: Vec<Node>,
    calls: Vec<Call>,
    failures: Vec<Failure>,
    settles: usize,
    fail_settle_after: Option<usize>,
    drop_partitions: bool,
    array_not_block_device: bool,
    without_filesystem_uuid: bool,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<State>,
}

/// A blank disk with 512 byte sectors.
pub fn disk(path: impl Into<PathBuf>, model: Option<&str>, size: u64) -> BlockDevice {
    BlockDevice {
        path: path.into(),
        device_type: "disk".into(),
        model: model.map(str::to_owned),
        size,
        physical_sector_size: 512,
        ..Default::default()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a blank disk with 512 byte sectors.
    pub fn with_disk(self, path: impl Into<PathBuf>, model: &str, size: u64) -> Self {
        self.with_device(disk(path, Some(model), size))
    }

    /// Adds a top-level device together with its children.
    pub fn with_device(self, device: BlockDevice) -> Self {
        self.insert(device, Vec::new());
        self
    }

    fn insert(&self, mut device: BlockDevice, parents: Vec<PathBuf>) {
        let children = std::mem::take(&mut device.children);
        let path = device.path.clone();
        self.state.lock().unwrap().nodes.push(Node { device, parents });
        for child in children {
            self.insert(child, vec![path.clone()]);
        }
    }

    pub fn fail(self, failure: Failure) -> Self {
        self.state.lock().unwrap().failures.push(failure);
        self
    }

    /// Make every settle fail once `count` settles have succeeded.
    pub fn fail_settle_after(&self, count: usize) {
        self.state.lock().unwrap().fail_settle_after = Some(count);
    }

    /// Partitioning succeeds but the partition never shows up.
    pub fn drop_partitions(self) -> Self {
        self.state.lock().unwrap().drop_partitions = true;
        self
    }

    /// Arrays get created but their node is not a block device.
    pub fn array_not_block_device(self) -> Self {
        self.state.lock().unwrap().array_not_block_device = true;
        self
    }

    /// mkfs does not assign a filesystem UUID.
    pub fn without_filesystem_uuid(self) -> Self {
        self.state.lock().unwrap().without_filesystem_uuid = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn record_marker(&self, marker: &str) {
        self.record(Call::Marker(marker.into()));
    }

    /// Current tree under `path`, if the device exists.
    pub fn device(&self, path: impl AsRef<Path>) -> Option<BlockDevice> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .iter()
            .any(|node| node.device.path == path.as_ref())
            .then(|| state.tree(path.as_ref()))
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check_failure(&self, failure: Failure) -> Result<(), Error> {
        if self.state.lock().unwrap().failures.contains(&failure) {
            bail!("Injected failure: {failure:?}");
        }
        Ok(())
    }
}

impl State {
    fn node_mut(&mut self, path: &Path) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.device.path == path)
    }

    fn node(&self, path: &Path) -> Option<&Node> {
        self.nodes.iter().find(|node| node.device.path == path)
    }

    fn tree(&self, path: &Path) -> BlockDevice {
        let Some(node) = self.node(path) else {
            return BlockDevice::default();
        };
        let mut device = node.device.clone();
        device.children = self
            .nodes
            .iter()
            .filter(|child| child.parents.iter().any(|parent| parent == path))
            .map(|child| self.tree(&child.device.path))
            .collect();
        device
    }

    fn roots(&self) -> Vec<BlockDevice> {
        self.nodes
            .iter()
            .filter(|node| node.parents.is_empty())
            .map(|node| self.tree(&node.device.path))
            .collect()
    }
}

/// `/dev/sda` -> `/dev/sda1`, `/dev/nvme0n1` -> `/dev/nvme0n1p1`.
fn first_partition_path(disk: &Path) -> PathBuf {
    let disk = disk.to_string_lossy();
    if disk.ends_with(|c: char| c.is_ascii_digit()) {
        PathBuf::from(format!("{disk}p1"))
    } else {
        PathBuf::from(format!("{disk}1"))
    }
}

fn array_size(level: RaidLevel, member_sizes: &[u64]) -> u64 {
    let count = member_sizes.len() as u64;
    let smallest = member_sizes.iter().copied().min().unwrap_or(0);
    match level {
        RaidLevel::Raid0 => member_sizes.iter().sum(),
        RaidLevel::Raid1 => smallest,
        RaidLevel::Raid4 | RaidLevel::Raid5 => count.saturating_sub(1) * smallest,
        RaidLevel::Raid6 => count.saturating_sub(2) * smallest,
        RaidLevel::Raid10 => count * smallest / 2,
    }
}

impl BlockDeviceHost for FakeHost {
    fn settle(&self) -> Result<(), Error> {
        self.record(Call::Settle);
        let mut state = self.state.lock().unwrap();
        let attempt = state.settles;
        state.settles += 1;
        match state.fail_settle_after {
            Some(count) if attempt >= count => bail!("udevadm settle failed"),
            _ => Ok(()),
        }
    }

    fn list_block_devices(&self, path: Option<&Path>) -> Result<Vec<BlockDevice>, Error> {
        self.record(Call::List(path.map(Path::to_path_buf)));
        self.check_failure(Failure::List)?;

        let state = self.state.lock().unwrap();
        match path {
            None => Ok(state.roots()),
            Some(path) if state.node(path).is_some() => Ok(vec![state.tree(path)]),
            Some(path) => bail!("{}: not a block device", path.display()),
        }
    }

    fn create_partition(&self, request: &PartitionRequest) -> Result<(), Error> {
        self.record(Call::CreatePartition(request.clone()));
        self.check_failure(Failure::CreatePartition)?;

        let mut state = self.state.lock().unwrap();
        let drop_partitions = state.drop_partitions;
        let Some(disk) = state.node_mut(&request.disk) else {
            bail!("Problem opening {} for reading", request.disk.display());
        };
        disk.device.partition_table_type = Some("gpt".into());
        if drop_partitions {
            return Ok(());
        }

        let partition = BlockDevice {
            path: first_partition_path(&request.disk),
            device_type: "part".into(),
            size: disk.device.size.saturating_sub(PARTITION_ALIGNMENT_BYTES),
            physical_sector_size: disk.device.physical_sector_size,
            partition_uuid: Some(request.partition_uuid.to_string().to_uppercase()),
            ..Default::default()
        };
        state.nodes.push(Node {
            device: partition,
            parents: vec![request.disk.clone()],
        });
        Ok(())
    }

    fn create_array(&self, request: &ArrayRequest) -> Result<(), Error> {
        self.record(Call::CreateArray(request.clone()));
        self.check_failure(Failure::CreateArray)?;

        if request.members.len() == 1 && !request.force {
            bail!(
                "mdadm: '1' is an unusual number of drives for an array, so it is probably a \
                mistake. If you really mean it you will need to specify --force before setting \
                the number of drives."
            );
        }

        let mut state = self.state.lock().unwrap();
        let mut member_sizes = Vec::new();
        for member in &request.members {
            match state.node(member) {
                Some(node) => member_sizes.push(node.device.size),
                None => bail!("mdadm: cannot open {}: No such file or directory", member.display()),
            }
        }

        let array = BlockDevice {
            path: request.path.clone(),
            device_type: request.level.to_string(),
            size: array_size(request.level, &member_sizes),
            physical_sector_size: 512,
            ..Default::default()
        };
        state.nodes.push(Node {
            device: array,
            parents: request.members.clone(),
        });
        Ok(())
    }

    fn is_block_device(&self, path: &Path) -> Result<bool, Error> {
        self.record(Call::IsBlockDevice(path.to_path_buf()));
        let state = self.state.lock().unwrap();
        Ok(!state.array_not_block_device && state.node(path).is_some())
    }

    fn make_filesystem(&self, request: &FilesystemRequest) -> Result<(), Error> {
        self.record(Call::MakeFilesystem(request.clone()));
        self.check_failure(Failure::MakeFilesystem)?;

        let (device, filesystem, label) = match request {
            FilesystemRequest::Builtin {
                device,
                filesystem,
                label,
                ..
            } => (device, Some(filesystem.clone()), Some(label.clone())),
            FilesystemRequest::Custom { device, command } => (
                device,
                command
                    .first()
                    .and_then(|program| program.strip_prefix("mkfs."))
                    .map(str::to_owned),
                None,
            ),
        };

        let mut state = self.state.lock().unwrap();
        let without_uuid = state.without_filesystem_uuid;
        let Some(node) = state.node_mut(device) else {
            bail!("mkfs: {} does not exist", device.display());
        };
        node.device.filesystem_type = filesystem;
        node.device.label = label;
        if !without_uuid {
            node.device.uuid = Some(FAKE_FILESYSTEM_UUID.into());
        }
        Ok(())
    }

    fn mount(&self, request: &MountRequest) -> Result<(), Error> {
        self.record(Call::Mount(request.clone()));
        self.check_failure(Failure::Mount)?;
        Ok(())
    }
}
