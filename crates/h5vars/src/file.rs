//! Files and the in-memory object tree shared by every handle on a file.
//!
//! A file is loaded into memory when opened and written back as a complete
//! HDF5 image on [`File::flush`], on [`File::close`], or when the last handle
//! on a modified file goes away.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use h5vars_format::link::{validate_name, LinkTarget};
use h5vars_format::reader::{FileReader, ObjectInfo};
use h5vars_format::writer::{write_file, GroupSpec, NodeSpec};

use crate::dataset::DatasetNode;
use crate::error::{Error, Result};
use crate::group::Group;

/// How an existing file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

pub(crate) type Shared = Rc<RefCell<FileState>>;

/// Target of a link inside a group: an index into the file's group or
/// dataset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Node {
    Group(usize),
    Dataset(usize),
}

#[derive(Debug, Default)]
pub(crate) struct GroupNode {
    /// Links in creation order.
    pub(crate) links: Vec<(String, Node)>,
}

#[derive(Debug)]
pub(crate) struct FileState {
    path: PathBuf,
    access: Access,
    /// Index 0 is the root group.
    pub(crate) groups: Vec<GroupNode>,
    pub(crate) datasets: Vec<DatasetNode>,
    open_objects: usize,
    closed: bool,
    pub(crate) dirty: bool,
}

impl FileState {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::FileClosed);
        }
        Ok(())
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if self.access == Access::ReadOnly {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    pub(crate) fn lookup(&self, group: usize, name: &str) -> Result<Node> {
        self.groups[group]
            .links
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, node)| node)
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// Fails without side effects when `name` is invalid or taken.
    pub(crate) fn check_new_link(&self, group: usize, name: &str) -> Result<()> {
        validate_name(name)?;
        if self.groups[group].links.iter().any(|(n, _)| n == name) {
            return Err(Error::AlreadyExists(name.to_owned()));
        }
        Ok(())
    }

    pub(crate) fn add_link(&mut self, group: usize, name: &str, node: Node) {
        self.groups[group].links.push((name.to_owned(), node));
        self.dirty = true;
    }

    pub(crate) fn acquire(&mut self) {
        self.open_objects += 1;
    }

    pub(crate) fn release(&mut self) {
        self.open_objects = self.open_objects.saturating_sub(1);
    }

    fn group_spec(&self, index: usize, name: &str) -> GroupSpec {
        let children = self.groups[index]
            .links
            .iter()
            .map(|(child, node)| match *node {
                Node::Group(g) => NodeSpec::Group(self.group_spec(g, child)),
                Node::Dataset(d) => NodeSpec::Dataset(self.datasets[d].to_spec(child)),
            })
            .collect();
        GroupSpec {
            name: name.to_owned(),
            children,
        }
    }

    fn flush(&mut self) -> Result<()> {
        let bytes = write_file(&self.group_spec(0, ""))?;
        fs::write(&self.path, &bytes)?;
        self.dirty = false;
        log::debug!("flushed {} ({} bytes)", self.path.display(), bytes.len());
        Ok(())
    }

    fn load(path: &Path, access: Access) -> Result<Self> {
        let bytes = fs::read(path)?;
        let reader = FileReader::new(&bytes)?;
        let mut state = Self {
            path: path.to_path_buf(),
            access,
            groups: Vec::new(),
            datasets: Vec::new(),
            open_objects: 0,
            closed: false,
            dirty: false,
        };
        let mut seen = HashMap::new();
        state.load_group(&reader, reader.root_address(), &mut seen)?;
        log::debug!(
            "opened {} ({:?}): {} groups, {} datasets",
            path.display(),
            access,
            state.groups.len(),
            state.datasets.len()
        );
        Ok(state)
    }

    fn load_group(
        &mut self,
        reader: &FileReader<'_>,
        address: u64,
        seen: &mut HashMap<u64, Node>,
    ) -> Result<usize> {
        let ObjectInfo::Group { links } = reader.object(address)? else {
            return Err(Error::NotAGroup(format!("object at {address:#x}")));
        };
        let index = self.groups.len();
        self.groups.push(GroupNode::default());
        seen.insert(address, Node::Group(index));

        for link in links {
            let LinkTarget::Hard(target) = link.target else {
                log::debug!("skipping soft link {:?}", link.name);
                continue;
            };
            let node = match seen.get(&target) {
                Some(&node) => node,
                None => match reader.object(target)? {
                    ObjectInfo::Group { .. } => {
                        Node::Group(self.load_group(reader, target, seen)?)
                    }
                    ObjectInfo::Dataset(info) => {
                        let stored = reader.read_data(&info)?;
                        self.datasets.push(DatasetNode::from_info(&info, stored)?);
                        let node = Node::Dataset(self.datasets.len() - 1);
                        seen.insert(target, node);
                        node
                    }
                },
            };
            self.groups[index].links.push((link.name, node));
        }
        Ok(index)
    }
}

impl Drop for FileState {
    fn drop(&mut self) {
        if !self.closed && self.dirty && self.access == Access::ReadWrite {
            if let Err(err) = self.flush() {
                log::error!("flushing {} on release failed: {err}", self.path.display());
            }
        }
    }
}

/// Open-handle bookkeeping shared by [`Group`] and
/// [`Dataset`](crate::Dataset).
#[derive(Debug)]
pub(crate) struct ObjectHandle {
    state: Shared,
    kind: &'static str,
    name: String,
    released: bool,
}

impl ObjectHandle {
    pub(crate) fn new(state: Shared, kind: &'static str, name: &str) -> Self {
        state.borrow_mut().acquire();
        Self {
            state,
            kind,
            name: name.to_owned(),
            released: false,
        }
    }

    pub(crate) fn state(&self) -> &Shared {
        &self.state
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn release(&mut self) {
        if !self.released {
            self.state.borrow_mut().release();
            self.released = true;
        }
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("{} {:?} dropped without close", self.kind, self.name);
            self.release();
        }
    }
}

/// An open HDF5 file.
#[derive(Debug)]
pub struct File {
    state: Shared,
    closed: bool,
}

impl File {
    /// Create `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut state = FileState {
            path: path.to_path_buf(),
            access: Access::ReadWrite,
            groups: vec![GroupNode::default()],
            datasets: Vec::new(),
            open_objects: 0,
            closed: false,
            dirty: true,
        };
        state.flush()?;
        log::debug!("created {}", path.display());
        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            closed: false,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P, access: Access) -> Result<Self> {
        let state = FileState::load(path.as_ref(), access)?;
        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            closed: false,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.state.borrow().path.clone()
    }

    /// Group and dataset handles currently open on this file.
    pub fn open_objects(&self) -> usize {
        self.state.borrow().open_objects
    }

    /// Write pending changes to disk. A no-op for read-only files.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        if state.access == Access::ReadWrite && state.dirty {
            state.flush()?;
        }
        Ok(())
    }

    /// Flush and close.
    ///
    /// Refuses with [`Error::ObjectsStillOpen`] while group or dataset
    /// handles remain. The data is flushed either way, and the file stays
    /// usable through those handles until the last of them is released.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush()?;
        let mut state = self.state.borrow_mut();
        if state.open_objects > 0 {
            return Err(Error::ObjectsStillOpen(state.open_objects));
        }
        state.closed = true;
        log::debug!("closed {}", state.path.display());
        Ok(())
    }

    /// Handle on the root group.
    pub fn root_group(&self) -> Result<Group> {
        self.state.borrow().ensure_open()?;
        Ok(Group::new(self.state.clone(), 0, "/"))
    }

    /// Create a group below the root group.
    pub fn create_group(&self, name: &str) -> Result<Group> {
        Group::create_in(&self.state, 0, name)
    }

    pub fn open_group(&self, name: &str) -> Result<Group> {
        Group::open_in(&self.state, 0, name)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("file {} dropped without close", self.state.borrow().path.display());
        }
    }
}
