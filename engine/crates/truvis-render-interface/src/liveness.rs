//! tracker 的存活标记
//!
//! tracker 持有 [`LivenessToken`]，资源管理器只持有 [`LivenessWatch`]。
//! token 被 drop 之后，所有 watch 都会观察到 tracker 已经死亡；watch 不会延长 token 的生命周期。

use std::rc::{Rc, Weak};

/// 由 tracker 独占，不可 clone
#[derive(Debug)]
pub struct LivenessToken {
    alive: Rc<()>,
}
impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}
impl LivenessToken {
    pub fn new() -> Self {
        Self { alive: Rc::new(()) }
    }

    #[inline]
    pub fn watch(&self) -> LivenessWatch {
        LivenessWatch {
            alive: Rc::downgrade(&self.alive),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LivenessWatch {
    alive: Weak<()>,
}
impl LivenessWatch {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_observes_drop() {
        let token = LivenessToken::new();
        let watch = token.watch();
        let another = watch.clone();
        assert!(watch.is_alive());

        drop(token);
        assert!(!watch.is_alive());
        assert!(!another.is_alive());
    }
}
