// SPDX-License-Identifier: Apache-2.0

//! Operation bitmask for normalized filesystem events.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::EventKind;

/// File operations observed on a watched path.
///
/// In addition to the OS-level operations, [`Op::DIR_CHILD`] marks an event
/// whose path is a child of a watched directory rather than a watched path
/// itself.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Op(u32);

impl Op {
    pub const CREATE: Op = Op(1 << 0);
    pub const WRITE: Op = Op(1 << 1);
    pub const REMOVE: Op = Op(1 << 2);
    pub const RENAME: Op = Op(1 << 3);
    pub const CHMOD: Op = Op(1 << 4);
    pub const DIR_CHILD: Op = Op(1 << 5);

    const NAMES: [(Op, &'static str); 6] = [
        (Op::CREATE, "CREATE"),
        (Op::REMOVE, "REMOVE"),
        (Op::WRITE, "WRITE"),
        (Op::RENAME, "RENAME"),
        (Op::CHMOD, "CHMOD"),
        (Op::DIR_CHILD, "DIR_CHILD"),
    ];

    pub const fn empty() -> Self {
        Op(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Op) -> bool {
        self.0 & other.0 == other.0
    }

    /// Map a `notify` event kind onto an operation.
    ///
    /// Returns an empty op for kinds that carry no content or namespace
    /// change (reads, opens, unclassified events).
    pub fn from_kind(kind: &EventKind) -> Op {
        match kind {
            EventKind::Create(_) => Op::CREATE,
            EventKind::Modify(ModifyKind::Metadata(_)) => Op::CHMOD,
            EventKind::Modify(ModifyKind::Name(_)) => Op::RENAME,
            EventKind::Modify(_) => Op::WRITE,
            EventKind::Remove(_) => Op::REMOVE,
            // inotify reports IN_CLOSE_WRITE after the final flush of a writer
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Op::WRITE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::empty(),
        }
    }
}

impl BitOr for Op {
    type Output = Op;

    fn bitor(self, rhs: Op) -> Op {
        Op(self.0 | rhs.0)
    }
}

impl BitOrAssign for Op {
    fn bitor_assign(&mut self, rhs: Op) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (op, name) in Op::NAMES {
            if self.contains(op) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    #[test]
    fn test_display() {
        assert_eq!(Op::empty().to_string(), "");
        assert_eq!(Op::WRITE.to_string(), "WRITE");
        assert_eq!((Op::CREATE | Op::DIR_CHILD).to_string(), "CREATE|DIR_CHILD");
        assert_eq!(
            (Op::WRITE | Op::CREATE | Op::REMOVE).to_string(),
            "CREATE|REMOVE|WRITE"
        );
    }

    #[test]
    fn test_contains() {
        let op = Op::WRITE | Op::DIR_CHILD;
        assert!(op.contains(Op::WRITE));
        assert!(op.contains(Op::DIR_CHILD));
        assert!(!op.contains(Op::CREATE));
        assert!(op.contains(Op::empty()));

        let mut op = Op::empty();
        assert!(op.is_empty());
        op |= Op::CHMOD;
        assert_eq!(op.bits(), 1 << 4);
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(
            Op::from_kind(&EventKind::Create(CreateKind::File)),
            Op::CREATE
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Op::WRITE
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Any)),
            Op::WRITE
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            Op::CHMOD
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Op::RENAME
        );
        assert_eq!(
            Op::from_kind(&EventKind::Remove(RemoveKind::File)),
            Op::REMOVE
        );
        assert_eq!(
            Op::from_kind(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            Op::WRITE
        );
        assert!(Op::from_kind(&EventKind::Access(AccessKind::Read)).is_empty());
        assert!(Op::from_kind(&EventKind::Any).is_empty());
    }
}
