use slotmap::{Key, SlotMap};

use crate::error::{GfxError, GfxResult};

/// 句柄表
///
/// 为每个插入的值分配一个唯一句柄，查找和删除都是 O(1)。
///
/// 句柄是 slotmap 的 key，由 slot 索引和代际号组成。slot 被释放后索引可以复用，
/// 但代际号会递增，所以旧句柄永远不会指向新的条目，`get` 会返回 `InvalidHandle`。
///
/// # 使用示例
/// ```ignore
/// let mut table: HandleTable<NativeBufferHandle, HostBuffer> = HandleTable::new();
/// let handle = table.add(buffer);
/// assert!(table.remove_entry(handle));
/// assert!(!table.remove_entry(handle)); // 重复删除不会出错
/// ```
pub struct HandleTable<K: Key, V> {
    slots: SlotMap<K, V>,
}
impl<K: Key, V> Default for HandleTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl<K: Key, V> HandleTable<K, V> {
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }
}
// add & remove
impl<K: Key, V> HandleTable<K, V> {
    /// 插入一个值，返回的句柄在所有存活句柄中唯一
    #[inline]
    pub fn add(&mut self, value: V) -> K {
        self.slots.insert(value)
    }

    /// 移除句柄对应的值；句柄已经不存在时返回 None
    #[inline]
    pub fn remove(&mut self, handle: K) -> Option<V> {
        self.slots.remove(handle)
    }

    /// 只关心是否删除成功的版本，重复删除返回 false
    #[inline]
    pub fn remove_entry(&mut self, handle: K) -> bool {
        self.slots.remove(handle).is_some()
    }

    #[inline]
    pub fn retain(&mut self, f: impl FnMut(K, &mut V) -> bool) {
        self.slots.retain(f)
    }

    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
        self.slots.drain()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.slots.clear()
    }
}
// lookup
impl<K: Key, V> HandleTable<K, V> {
    pub fn get(&self, handle: K) -> GfxResult<&V> {
        self.slots.get(handle).ok_or_else(|| GfxError::invalid_handle(handle))
    }

    pub fn get_mut(&mut self, handle: K) -> GfxResult<&mut V> {
        self.slots.get_mut(handle).ok_or_else(|| GfxError::invalid_handle(handle))
    }

    #[inline]
    pub fn try_get(&self, handle: K) -> Option<&V> {
        self.slots.get(handle)
    }

    #[inline]
    pub fn try_get_mut(&mut self, handle: K) -> Option<&mut V> {
        self.slots.get_mut(handle)
    }

    #[inline]
    pub fn contains(&self, handle: K) -> bool {
        self.slots.contains_key(handle)
    }
}
// getters
impl<K: Key, V> HandleTable<K, V> {
    #[inline]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.slots.keys()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.slots.iter_mut()
    }
}
