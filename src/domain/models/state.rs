/// Lifecycle of the single iframe owned by a widget instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameState {
    #[default]
    NoIframe,
    /// Created but `display:none`, either pre-rendered or closed by the
    /// assistant.
    Hidden,
    Visible,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PillState {
    #[default]
    Absent,
    Shown,
    Hidden,
}
