// SPDX-License-Identifier: GPL-3.0-only

//! Subvolume tree traversal
//!
//! A traversal keeps one frame per subvolume on the way from `top` down to
//! the subvolume being expanded. Each frame remembers where its own search
//! for child references stopped, so every step resumes with at most one
//! bounded tree search instead of restarting from `top`.
//!
//! Traversals see the live filesystem. A subvolume removed after its
//! reference was read makes that step fail; the traversal itself can be
//! continued.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::iter::FusedIterator;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use btrfs_subvol_sys::items::{
    BTRFS_FIRST_FREE_OBJECTID, BTRFS_ROOT_REF_KEY, BTRFS_ROOT_TREE_OBJECTID,
};
use btrfs_subvol_sys::{BtrfsIoctlSearchKey, RootRef, SearchItem};
use btrfs_subvol_types::{SubvolumeId, SubvolumeInfo};
use tracing::{debug, trace, warn};

use crate::error::{BtrfsError, ErrorKind, Result};
use crate::handle::{self, RootFd};
use crate::info;
use crate::search::{SEARCH_BATCH, TreeSearch, advance_key, corrupt_item};

/// Order in which a traversal yields subvolumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// Every subvolume before its descendants.
    #[default]
    PreOrder,
    /// Every subvolume after its descendants.
    PostOrder,
}

/// What a traversal yields alongside each path.
pub trait Payload: Sized {
    fn load<S: TreeSearch + ?Sized>(search: &S, id: SubvolumeId) -> Result<Self>;
}

impl Payload for SubvolumeId {
    fn load<S: TreeSearch + ?Sized>(_search: &S, id: SubvolumeId) -> Result<Self> {
        Ok(id)
    }
}

impl Payload for SubvolumeInfo {
    fn load<S: TreeSearch + ?Sized>(search: &S, id: SubvolumeId) -> Result<Self> {
        info::read_subvolume_info(search, id)
    }
}

#[derive(Debug)]
struct Frame {
    id: SubvolumeId,
    /// Child references of `id` not yet searched for.
    key: BtrfsIoctlSearchKey,
    /// Child references found but not yet visited.
    items: VecDeque<SearchItem>,
    /// Length of this subvolume's path in the shared path buffer.
    path_len: usize,
}

impl Frame {
    fn new(id: SubvolumeId, path_len: usize) -> Self {
        Self {
            id,
            key: BtrfsIoctlSearchKey::for_object(BTRFS_ROOT_TREE_OBJECTID, id, BTRFS_ROOT_REF_KEY),
            items: VecDeque::new(),
            path_len,
        }
    }
}

/// Iterator over the subvolumes beneath a subvolume.
///
/// Yields each subvolume's path relative to `top` with a [`Payload`]:
/// its id ([`SubvolumeIds`]) or its full metadata ([`SubvolumeInfos`]).
/// `top` itself is never yielded. Errors are reported for the step that
/// hit them; iteration may continue afterwards. Once exhausted, the
/// iterator stays exhausted.
///
/// Listing needs `CAP_SYS_ADMIN`.
#[derive(Debug)]
pub struct SubvolumeIterator<P, S: TreeSearch> {
    search: S,
    top: SubvolumeId,
    order: Order,
    stack: Vec<Frame>,
    path: Vec<u8>,
    peeked: Option<Result<Option<(PathBuf, P)>>>,
    exhausted: bool,
}

/// Traversal yielding subvolume ids.
pub type SubvolumeIds<'fd> = SubvolumeIterator<SubvolumeId, RootFd<'fd>>;

/// Traversal yielding subvolume metadata.
pub type SubvolumeInfos<'fd> = SubvolumeIterator<SubvolumeInfo, RootFd<'fd>>;

impl<P: Payload> SubvolumeIterator<P, RootFd<'static>> {
    /// Traverse the filesystem containing `path`, which is opened and owned
    /// by the iterator. `top` 0 selects the subvolume containing `path`.
    pub fn open<Q: AsRef<Path>>(path: Q, top: SubvolumeId, order: Order) -> Result<Self> {
        let fd = handle::open(path.as_ref())?;
        handle::check_btrfs(fd.as_fd())?;
        Self::with_search(RootFd::Owned(fd), top, order)
    }
}

impl<'fd, P: Payload> SubvolumeIterator<P, RootFd<'fd>> {
    /// Traverse the filesystem containing `fd`. The descriptor stays owned
    /// by the caller.
    pub fn from_fd(fd: BorrowedFd<'fd>, top: SubvolumeId, order: Order) -> Result<Self> {
        handle::check_btrfs(fd)?;
        Self::with_search(RootFd::Borrowed(fd), top, order)
    }
}

impl<P: Payload, S: TreeSearch> SubvolumeIterator<P, S> {
    /// Traverse using an arbitrary [`TreeSearch`] implementation.
    pub fn with_search(search: S, top: SubvolumeId, order: Order) -> Result<Self> {
        let top = if top == 0 {
            search.ino_lookup(0, BTRFS_FIRST_FREE_OBJECTID)?.0
        } else {
            info::ensure_subvolume(&search, top)?;
            top
        };
        debug!(top, ?order, "opened subvolume iterator");

        Ok(Self {
            search,
            top,
            order,
            stack: vec![Frame::new(top, 0)],
            path: Vec::new(),
            peeked: None,
            exhausted: false,
        })
    }

    /// The subvolume the traversal is rooted at.
    pub fn top(&self) -> SubvolumeId {
        self.top
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Fetch the next subvolume, or `None` once the traversal is exhausted.
    pub fn advance(&mut self) -> Result<Option<(PathBuf, P)>> {
        match self.peeked.take() {
            Some(result) => result,
            None => self.fetch(),
        }
    }

    /// Fetch the next result and hold it for [`get_next`](Self::get_next).
    ///
    /// Returns `false` only when the traversal is exhausted; a failed step
    /// counts as a result. Calling this repeatedly fetches once.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            let result = self.fetch();
            self.peeked = Some(result);
        }
        !matches!(self.peeked, Some(Ok(None)))
    }

    /// Take the result fetched by [`has_next`](Self::has_next), fetching it
    /// first if needed. Exhaustion is reported as `StopIteration`.
    pub fn get_next(&mut self) -> Result<(PathBuf, P)> {
        self.advance()?
            .ok_or_else(|| BtrfsError::new(ErrorKind::StopIteration))
    }

    /// Release the iterator and the descriptor it owns, if any.
    pub fn close(self) {}

    fn fetch(&mut self) -> Result<Option<(PathBuf, P)>> {
        let Some((path, id)) = self.step()? else {
            return Ok(None);
        };
        let payload = P::load(&self.search, id)?;
        Ok(Some((path, payload)))
    }

    fn path_of(&self, len: usize) -> PathBuf {
        PathBuf::from(OsString::from_vec(self.path[..len].to_vec()))
    }

    /// Advance the traversal to the next subvolume to yield.
    fn step(&mut self) -> Result<Option<(PathBuf, SubvolumeId)>> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                if !self.exhausted {
                    debug!(top = self.top, "subvolume iterator exhausted");
                    self.exhausted = true;
                }
                return Ok(None);
            };

            if frame.items.is_empty() {
                frame.key.nr_items = SEARCH_BATCH;
                let items = self.search.tree_search(&mut frame.key)?;
                if items.is_empty() {
                    let done = self.stack.pop();
                    if self.order == Order::PostOrder && !self.stack.is_empty() {
                        if let Some(done) = done {
                            return Ok(Some((self.path_of(done.path_len), done.id)));
                        }
                    }
                    continue;
                }
                frame.items = items.into();
            }

            let Some(item) = frame.items.pop_front() else {
                continue;
            };
            advance_key(&mut frame.key, &item);

            if item.item_type != BTRFS_ROOT_REF_KEY {
                warn!(
                    objectid = item.objectid,
                    item_type = item.item_type,
                    "skipping unexpected item in subvolume search"
                );
                continue;
            }

            let parent_id = frame.id;
            let parent_len = frame.path_len;
            let root_ref = RootRef::parse(&item.data).map_err(|e| corrupt_item(&item, e))?;
            trace!(parent = parent_id, child = item.offset, "root ref");

            let (_, dir) = self.search.ino_lookup(parent_id, root_ref.dirid)?;

            self.path.truncate(parent_len);
            if parent_len > 0 {
                self.path.push(b'/');
            }
            self.path.extend_from_slice(&dir);
            self.path.extend_from_slice(&root_ref.name);
            self.stack.push(Frame::new(item.offset, self.path.len()));

            if self.order == Order::PreOrder {
                return Ok(Some((self.path_of(self.path.len()), item.offset)));
            }
        }
    }
}

impl<P, S: TreeSearch> Drop for SubvolumeIterator<P, S> {
    fn drop(&mut self) {
        debug!(top = self.top, "closed subvolume iterator");
    }
}

impl<P: Payload, S: TreeSearch> Iterator for SubvolumeIterator<P, S> {
    type Item = Result<(PathBuf, P)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

impl<P: Payload, S: TreeSearch> FusedIterator for SubvolumeIterator<P, S> {}

impl<P, S: TreeSearch + AsFd> AsFd for SubvolumeIterator<P, S> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.search.as_fd()
    }
}
