use bon::Builder;

/// 单帧默认上限：64 KiB
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// 总线配置
#[derive(Clone, Copy, Debug, Builder)]
pub struct BusConfig {
    /// 捕获回调中的 panic 并记为 `CallbackFailure`，保证同一轮分发继续执行
    #[builder(default = true)]
    pub catch_panics: bool,
    /// 记录每轮分发的耗时（debug 级别）
    #[builder(default = false)]
    pub trace_dispatch: bool,
    /// 接收帧的字节上限，超出按 `InvalidPacket` 丢弃
    #[builder(default = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            trace_dispatch: false,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default_impl() {
        let built = BusConfig::builder().build();
        let default = BusConfig::default();

        assert_eq!(built.catch_panics, default.catch_panics);
        assert_eq!(built.trace_dispatch, default.trace_dispatch);
        assert_eq!(built.max_frame_bytes, default.max_frame_bytes);

        let custom = BusConfig::builder().trace_dispatch(true).max_frame_bytes(128).build();
        assert!(custom.trace_dispatch);
        assert_eq!(custom.max_frame_bytes, 128);
    }
}
