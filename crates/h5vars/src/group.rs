//! Group handles.

use h5vars_format::Datatype;

use crate::dataset::{Dataset, DatasetNode};
use crate::error::{Error, Result};
use crate::file::{GroupNode, Node, ObjectHandle, Shared};
use crate::plist::DatasetCreate;
use crate::space::Dataspace;

/// An open group. Release it with [`Group::close`].
#[derive(Debug)]
pub struct Group {
    handle: ObjectHandle,
    index: usize,
}

impl Group {
    pub(crate) fn new(state: Shared, index: usize, name: &str) -> Self {
        Self {
            handle: ObjectHandle::new(state, "group", name),
            index,
        }
    }

    pub(crate) fn create_in(state: &Shared, parent: usize, name: &str) -> Result<Self> {
        let index = {
            let mut s = state.borrow_mut();
            s.ensure_writable()?;
            s.check_new_link(parent, name)?;
            s.groups.push(GroupNode::default());
            let index = s.groups.len() - 1;
            s.add_link(parent, name, Node::Group(index));
            index
        };
        log::debug!("created group {name:?}");
        Ok(Self::new(state.clone(), index, name))
    }

    pub(crate) fn open_in(state: &Shared, parent: usize, name: &str) -> Result<Self> {
        let node = {
            let s = state.borrow();
            s.ensure_open()?;
            s.lookup(parent, name)?
        };
        match node {
            Node::Group(index) => Ok(Self::new(state.clone(), index, name)),
            Node::Dataset(_) => Err(Error::NotAGroup(name.to_owned())),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn create_group(&self, name: &str) -> Result<Group> {
        Self::create_in(self.handle.state(), self.index, name)
    }

    pub fn open_group(&self, name: &str) -> Result<Group> {
        Self::open_in(self.handle.state(), self.index, name)
    }

    /// Create a dataset of `dtype` elements shaped by `space`.
    ///
    /// `dcpl` is validated against the type and shape; chunked datasets
    /// allocate no storage until written.
    pub fn create_dataset(
        &self,
        name: &str,
        dtype: &Datatype,
        space: &Dataspace,
        dcpl: &DatasetCreate,
    ) -> Result<Dataset> {
        let state = self.handle.state();
        let index = {
            let mut s = state.borrow_mut();
            s.ensure_writable()?;
            s.check_new_link(self.index, name)?;
            let node = DatasetNode::new(*dtype, space, dcpl.resolve(dtype, space)?);
            s.datasets.push(node);
            let index = s.datasets.len() - 1;
            s.add_link(self.index, name, Node::Dataset(index));
            index
        };
        log::debug!(
            "created dataset {name:?}: {dtype}, dims {:?}, max {:?}, {:?} layout, {} filters",
            space.dims(),
            space.max_dims(),
            dcpl.layout(),
            dcpl.nfilters()
        );
        Ok(Dataset::new(state.clone(), index, name))
    }

    pub fn open_dataset(&self, name: &str) -> Result<Dataset> {
        let state = self.handle.state();
        let node = {
            let s = state.borrow();
            s.ensure_open()?;
            s.lookup(self.index, name)?
        };
        match node {
            Node::Dataset(index) => Ok(Dataset::new(state.clone(), index, name)),
            Node::Group(_) => Err(Error::NotADataset(name.to_owned())),
        }
    }

    /// Names of all links in this group, sorted.
    pub fn link_names(&self) -> Result<Vec<String>> {
        let s = self.handle.state().borrow();
        s.ensure_open()?;
        let mut names: Vec<String> = s.groups[self.index]
            .links
            .iter()
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn close(mut self) -> Result<()> {
        self.handle.release();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::File;
    use tempfile::tempdir;

    #[test]
    fn names_are_single_components() {
        let dir = tempdir().unwrap();
        let file = File::create(dir.path().join("names.h5")).unwrap();
        let root = file.root_group().unwrap();
        assert!(matches!(root.create_group("a/b"), Err(Error::Format(_))));
        assert!(matches!(root.create_group(""), Err(Error::Format(_))));
        root.close().unwrap();
        file.close().unwrap();
    }

    #[test]
    fn group_and_dataset_kinds_checked() {
        let dir = tempdir().unwrap();
        let file = File::create(dir.path().join("kinds.h5")).unwrap();
        let grp = file.create_group("g").unwrap();
        let space = Dataspace::simple(&[2], None).unwrap();
        grp.create_dataset("d", &Datatype::NATIVE_INT, &space, &DatasetCreate::new())
            .unwrap()
            .close()
            .unwrap();
        grp.create_group("sub").unwrap().close().unwrap();
        assert!(matches!(grp.open_group("d"), Err(Error::NotAGroup(_))));
        assert!(matches!(grp.open_dataset("sub"), Err(Error::NotADataset(_))));
        assert!(matches!(
            grp.create_dataset("d", &Datatype::NATIVE_INT, &space, &DatasetCreate::new()),
            Err(Error::AlreadyExists(_))
        ));
        assert_eq!(grp.link_names().unwrap(), vec!["d".to_string(), "sub".to_string()]);
        grp.close().unwrap();
        file.close().unwrap();
    }

    #[test]
    fn dropped_handle_is_released() {
        let dir = tempdir().unwrap();
        let file = File::create(dir.path().join("drop.h5")).unwrap();
        {
            let _g = file.create_group("g").unwrap();
            assert_eq!(file.open_objects(), 1);
        }
        assert_eq!(file.open_objects(), 0);
        file.close().unwrap();
    }

    #[test]
    fn invalid_dataset_creation_leaves_no_link() {
        let dir = tempdir().unwrap();
        let file = File::create(dir.path().join("invalid.h5")).unwrap();
        let grp = file.create_group("g").unwrap();
        let space = Dataspace::simple(&[0], Some(&[crate::UNLIMITED])).unwrap();
        assert!(grp
            .create_dataset("v", &Datatype::NATIVE_FLOAT, &space, &DatasetCreate::new())
            .is_err());
        assert!(grp.link_names().unwrap().is_empty());
        grp.close().unwrap();
        file.close().unwrap();
    }
}
