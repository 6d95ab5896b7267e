#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based number of the track currently being downloaded.
    pub current: u32,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelViewModel {
    pub title: String,
    pub author: String,
    pub capture_status: String,
    pub status: String,
    pub download_enabled: bool,
    pub progress: Option<BatchProgress>,
    pub dirty: bool,
}
