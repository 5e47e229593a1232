use std::collections::HashMap;

use log::warn;

use crate::errors::PoolError;

/// 某一时刻上下文中仍存活的资源数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub textures: usize,
    pub programs: usize,
}

impl ResourceCounts {
    pub fn is_empty(&self) -> bool {
        self.textures == 0 && self.programs == 0
    }
}

/// 以自增id签发句柄的资源表，id从不复用，因此已释放的句柄不会误指向新资源
#[derive(Debug)]
pub(crate) struct ResourceTable<T> {
    kind: &'static str,
    next_id: u64,
    entries: HashMap<u64, T>,
}

impl<T> ResourceTable<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        ResourceTable {
            kind,
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, value);
        id
    }

    pub(crate) fn get(&self, id: u64) -> Result<&T, PoolError> {
        self.entries
            .get(&id)
            .ok_or_else(|| PoolError::UnknownResource(format!("{}#{id}", self.kind)))
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Result<&mut T, PoolError> {
        let kind = self.kind;
        self.entries
            .get_mut(&id)
            .ok_or_else(|| PoolError::UnknownResource(format!("{kind}#{id}")))
    }

    /// 删除未知句柄只告警不报错：释放路径上不应再产生新的失败
    pub(crate) fn remove(&mut self, id: u64) -> Option<T> {
        let removed = self.entries.remove(&id);
        if removed.is_none() {
            warn!("试图释放未知（或已释放）的{}#{id}", self.kind);
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// 清空并返回被清掉的数量
    pub(crate) fn drain_all(&mut self) -> usize {
        let leaked = self.entries.len();
        if leaked > 0 {
            warn!("释放上下文时仍有{leaked}个{}未被释放", self.kind);
        }
        self.entries.clear();
        leaked
    }
}
