//! 延迟销毁的 record 表
//!
//! buffer 和 texture 管理器共用同一套倒计时逻辑：
//! record 的 tracker 存活时为 `Active`；GC 第一次观察到 tracker 死亡时，
//! record 进入 `Condemned { defer_count }`；之后每次 GC 计数减 1，减到 0 时才真正销毁 Native 资源。

use slotmap::Key;
use truvis_gfx::basic::handle_table::HandleTable;

use crate::liveness::LivenessWatch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordState {
    Active,
    /// 还需要经过 `defer_count` 次 GC 才会被销毁
    Condemned { defer_count: u32 },
}

pub struct DeferredRecord<T> {
    payload: T,
    watch: LivenessWatch,
    state: RecordState,
}
impl<T> DeferredRecord<T> {
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    #[inline]
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Active 的 record 返回 0
    #[inline]
    pub fn defer_count(&self) -> u32 {
        match self.state {
            RecordState::Active => 0,
            RecordState::Condemned { defer_count } => defer_count,
        }
    }
}

/// GC 过程中和 Native 工厂交互的接口
pub trait RecordReclaimer<K, T> {
    /// record 刚被判定死亡，此时 Native 资源仍然有效
    fn on_condemn(&mut self, key: K, payload: &mut T);

    /// 销毁 record 对应的 Native 资源；返回 false 表示工厂不认识这个资源，record 依然会被移除
    fn destroy(&mut self, key: K, payload: T) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    /// 本次新进入 Condemned 的数量
    pub condemned: usize,
    /// 本次销毁的数量
    pub destroyed: usize,
    /// 工厂销毁失败的数量，已包含在 `destroyed` 中
    pub destroy_failed: usize,
}
impl GcStats {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.condemned == 0 && self.destroyed == 0
    }
}

pub struct DeferredRecords<K: Key, T> {
    records: HandleTable<K, DeferredRecord<T>>,
}
impl<K: Key, T> Default for DeferredRecords<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl<K: Key, T> DeferredRecords<K, T> {
    pub fn new() -> Self {
        Self {
            records: HandleTable::new(),
        }
    }
}
// insert & query
impl<K: Key, T> DeferredRecords<K, T> {
    /// 插入一个 Active 的 record
    pub fn insert(&mut self, payload: T, watch: LivenessWatch) -> K {
        self.records.add(DeferredRecord {
            payload,
            watch,
            state: RecordState::Active,
        })
    }

    #[inline]
    pub fn get(&self, key: K) -> Option<&DeferredRecord<T>> {
        self.records.try_get(key)
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.records.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (K, &DeferredRecord<T>)> {
        self.records.iter()
    }
}
// gc
impl<K: Key, T> DeferredRecords<K, T> {
    /// 执行一次 GC
    ///
    /// 1. 之前已经 Condemned 的 record 计数减 1，减到 0 的立即销毁
    /// 2. tracker 已经死亡的 Active record 进入 Condemned，计数为 `defer_count`；为 0 时立即销毁
    ///
    /// 所以 `defer_count = M` 时，tracker 在第 P 次 GC 之前死亡的资源恰好在第 P + M 次 GC 中销毁。
    pub fn collect_garbage(&mut self, defer_count: u32, reclaimer: &mut impl RecordReclaimer<K, T>) -> GcStats {
        let mut stats = GcStats::default();

        let mut expired = Vec::new();
        for (key, record) in self.records.iter_mut() {
            if let RecordState::Condemned { defer_count: remaining } = &mut record.state {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    expired.push(key);
                }
            }
        }
        self.destroy_records(expired, reclaimer, &mut stats);

        let mut expired = Vec::new();
        for (key, record) in self.records.iter_mut() {
            if record.state == RecordState::Active && !record.watch.is_alive() {
                record.state = RecordState::Condemned { defer_count };
                reclaimer.on_condemn(key, &mut record.payload);
                stats.condemned += 1;
                log::trace!("record {key:?} condemned, defer count {defer_count}");
                if defer_count == 0 {
                    expired.push(key);
                }
            }
        }
        self.destroy_records(expired, reclaimer, &mut stats);

        stats
    }

    /// 无视 defer count，立即销毁所有 record
    pub fn force_free_all(&mut self, reclaimer: &mut impl RecordReclaimer<K, T>) -> usize {
        let mut freed = 0;
        for (key, record) in self.records.drain() {
            if !reclaimer.destroy(key, record.payload) {
                log::warn!("force free: native resource of record {key:?} was already gone");
            }
            freed += 1;
        }
        freed
    }

    fn destroy_records(&mut self, keys: Vec<K>, reclaimer: &mut impl RecordReclaimer<K, T>, stats: &mut GcStats) {
        for key in keys {
            let Some(record) = self.records.remove(key) else {
                continue;
            };
            if !reclaimer.destroy(key, record.payload) {
                log::warn!("gc: failed to destroy native resource of record {key:?}, record dropped anyway");
                stats.destroy_failed += 1;
            }
            stats.destroyed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use slotmap::new_key_type;

    use super::*;
    use crate::liveness::LivenessToken;

    new_key_type! { struct TestKey; }

    #[derive(Default)]
    struct Recorder {
        condemned: Vec<u32>,
        destroyed: Vec<u32>,
        fail_destroy: bool,
    }
    impl RecordReclaimer<TestKey, u32> for Recorder {
        fn on_condemn(&mut self, _key: TestKey, payload: &mut u32) {
            self.condemned.push(*payload);
        }

        fn destroy(&mut self, _key: TestKey, payload: u32) -> bool {
            self.destroyed.push(payload);
            !self.fail_destroy
        }
    }

    #[test]
    fn test_destroyed_exactly_after_defer_count_passes() {
        let mut records: DeferredRecords<TestKey, u32> = DeferredRecords::new();
        let mut recorder = Recorder::default();
        let token = LivenessToken::new();
        let key = records.insert(1, token.watch());
        drop(token);

        let stats = records.collect_garbage(2, &mut recorder);
        assert_eq!(stats.condemned, 1);
        assert_eq!(records.get(key).unwrap().defer_count(), 2);

        records.collect_garbage(2, &mut recorder);
        assert_eq!(records.get(key).unwrap().state(), RecordState::Condemned { defer_count: 1 });
        assert!(recorder.destroyed.is_empty());

        let stats = records.collect_garbage(2, &mut recorder);
        assert_eq!(stats.destroyed, 1);
        assert_eq!(recorder.destroyed, vec![1]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_zero_defer_count_destroys_immediately() {
        let mut records: DeferredRecords<TestKey, u32> = DeferredRecords::new();
        let mut recorder = Recorder::default();
        let alive = LivenessToken::new();
        records.insert(1, alive.watch());
        records.insert(2, LivenessToken::new().watch());

        let stats = records.collect_garbage(0, &mut recorder);
        assert_eq!(stats, GcStats { condemned: 1, destroyed: 1, destroy_failed: 0 });
        assert_eq!(recorder.condemned, vec![2]);
        assert_eq!(recorder.destroyed, vec![2]);
        assert_eq!(records.count(), 1);
    }

    #[test]
    fn test_failed_destroy_still_erases_record() {
        let mut records: DeferredRecords<TestKey, u32> = DeferredRecords::new();
        let mut recorder = Recorder {
            fail_destroy: true,
            ..Default::default()
        };
        records.insert(5, LivenessToken::new().watch());

        let stats = records.collect_garbage(0, &mut recorder);
        assert_eq!(stats.destroy_failed, 1);
        assert!(records.is_empty());
    }

    #[test]
    fn test_force_free_ignores_defer_count() {
        let mut records: DeferredRecords<TestKey, u32> = DeferredRecords::new();
        let mut recorder = Recorder::default();
        let alive = LivenessToken::new();
        records.insert(1, alive.watch());
        records.insert(2, LivenessToken::new().watch());
        records.collect_garbage(3, &mut recorder);

        assert_eq!(records.force_free_all(&mut recorder), 2);
        assert!(records.is_empty());
        recorder.destroyed.sort();
        assert_eq!(recorder.destroyed, vec![1, 2]);
    }
}
