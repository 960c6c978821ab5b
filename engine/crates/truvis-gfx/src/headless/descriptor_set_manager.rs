use crate::basic::handle_table::HandleTable;
use crate::error::{GfxError, GfxResult};
use crate::resources::handles::DescriptorSetHandle;

/// 一个 descriptor set 所在的位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorSlot {
    pub pool_index: usize,
    pub slot_index: usize,
}

struct DescriptorPool {
    /// 空闲的 slot 索引
    free_slots: Vec<usize>,
}
impl DescriptorPool {
    fn new(pool_size: usize) -> Self {
        // 倒序放入，保证先分配低位的 slot
        Self {
            free_slots: (0..pool_size).rev().collect(),
        }
    }
}

/// 每张 texture 的 descriptor set 都从这里分配
///
/// 每个 pool 有 `max_frames_in_flight` 个 slot，用满后新建 pool；
/// 设置了 `max_pools` 时超出上限返回 `NotSupported`。
pub struct DescriptorSetManager {
    pool_size: usize,
    max_pools: Option<usize>,
    pools: Vec<DescriptorPool>,
    sets: HandleTable<DescriptorSetHandle, DescriptorSlot>,

    destroyed: bool,
}
// new & init
impl DescriptorSetManager {
    pub fn new(max_frames_in_flight: usize, max_pools: Option<usize>) -> GfxResult<Self> {
        if max_frames_in_flight == 0 {
            return Err(GfxError::usage("max_frames_in_flight must be at least 1"));
        }
        Ok(Self {
            pool_size: max_frames_in_flight,
            max_pools,
            pools: Vec::new(),
            sets: HandleTable::new(),
            destroyed: false,
        })
    }
}
// destroy
impl DescriptorSetManager {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    fn destroy_mut(&mut self) {
        if self.destroyed {
            return;
        }
        if !self.sets.is_empty() {
            log::warn!(
                "DescriptorSetManager destroyed while {} descriptor sets are still allocated",
                self.sets.count()
            );
        }
        self.sets.clear();
        self.pools.clear();
        self.destroyed = true;
    }
}
impl Drop for DescriptorSetManager {
    fn drop(&mut self) {
        if !self.destroyed {
            log::warn!("DescriptorSetManager dropped without destroy");
            self.destroy_mut();
        }
    }
}
// alloc & free
impl DescriptorSetManager {
    pub fn allocate(&mut self) -> GfxResult<DescriptorSetHandle> {
        let pool_index = match self.pools.iter().position(|pool| !pool.free_slots.is_empty()) {
            Some(index) => index,
            None => {
                if self.max_pools.is_some_and(|max| self.pools.len() >= max) {
                    return Err(GfxError::not_supported(format!(
                        "descriptor pool limit reached ({} pools of {} sets)",
                        self.pools.len(),
                        self.pool_size
                    )));
                }
                self.pools.push(DescriptorPool::new(self.pool_size));
                log::debug!("descriptor pool #{} created", self.pools.len() - 1);
                self.pools.len() - 1
            }
        };

        let pool = &mut self.pools[pool_index];
        let Some(slot_index) = pool.free_slots.pop() else {
            return Err(GfxError::usage("descriptor pool has no free slot"));
        };
        Ok(self.sets.add(DescriptorSlot { pool_index, slot_index }))
    }

    /// 句柄不存在时返回 false
    pub fn free(&mut self, handle: DescriptorSetHandle) -> bool {
        match self.sets.remove(handle) {
            Some(slot) => {
                self.pools[slot.pool_index].free_slots.push(slot.slot_index);
                true
            }
            None => {
                log::warn!("free: unknown descriptor set {handle:?}");
                false
            }
        }
    }
}
// getters
impl DescriptorSetManager {
    #[inline]
    pub fn slot(&self, handle: DescriptorSetHandle) -> Option<DescriptorSlot> {
        self.sets.try_get(handle).copied()
    }

    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.sets.count()
    }

    #[inline]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, 3)]
    #[case(2, 7)]
    #[case(3, 9)]
    fn test_pools_grow_with_frames_in_flight(#[case] max_frames_in_flight: usize, #[case] set_count: usize) {
        let mut manager = DescriptorSetManager::new(max_frames_in_flight, None).unwrap();
        let sets: Vec<_> = (0..set_count).map(|_| manager.allocate().unwrap()).collect();
        assert_eq!(manager.pool_count(), set_count.div_ceil(max_frames_in_flight));
        assert_eq!(manager.allocated_count(), set_count);

        let last = manager.slot(sets[set_count - 1]).unwrap();
        assert_eq!(last.pool_index, (set_count - 1) / max_frames_in_flight);
        assert_eq!(last.slot_index, (set_count - 1) % max_frames_in_flight);

        for set in sets {
            assert!(manager.free(set));
        }
        manager.destroy();
    }

    #[test]
    fn test_pools_grow_by_fif_size() {
        let mut manager = DescriptorSetManager::new(2, None).unwrap();
        let sets: Vec<_> = (0..5).map(|_| manager.allocate().unwrap()).collect();
        assert_eq!(manager.pool_count(), 3);
        assert_eq!(manager.allocated_count(), 5);
        assert_eq!(manager.slot(sets[2]), Some(DescriptorSlot { pool_index: 1, slot_index: 0 }));

        for set in sets {
            assert!(manager.free(set));
        }
        manager.destroy();
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut manager = DescriptorSetManager::new(2, Some(1)).unwrap();
        let a = manager.allocate().unwrap();
        let _b = manager.allocate().unwrap();
        assert!(matches!(manager.allocate(), Err(GfxError::NotSupported(_))));

        let slot = manager.slot(a).unwrap();
        assert!(manager.free(a));
        assert!(!manager.free(a));
        let c = manager.allocate().unwrap();
        assert_eq!(manager.slot(c), Some(slot));
        assert_eq!(manager.pool_count(), 1);
    }

    #[test]
    fn test_zero_fif_is_rejected() {
        assert!(DescriptorSetManager::new(0, None).is_err());
    }
}
