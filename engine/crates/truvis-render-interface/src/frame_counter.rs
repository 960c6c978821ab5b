pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    fif_count: usize,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, fif_count: usize) -> Self {
        Self {
            frame_id: init_frame_id,
            fif_count: fif_count.max(1),
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn fif_count(&self) -> usize {
        self.fif_count
    }
    /// 当前帧使用第几份 frame-in-flight 资源
    #[inline]
    pub fn frame_index(&self) -> usize {
        (self.frame_id % self.fif_count as u64) as usize
    }
    #[inline]
    pub fn frame_label(&self) -> char {
        // 超过 26 份时 label 会重复，只用于日志
        (b'A' + (self.frame_index() % 26) as u8) as char
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}
