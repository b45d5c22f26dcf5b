#[cfg(test)]
#[path = "replay_test.rs"]
mod tests;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

use crate::domain::models::CustomOffsets;
use crate::domain::services::WidgetController;

/// Something the host page does to the widget, as opposed to a message the
/// assistant iframe sends.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum HostStep {
    AddContainer {
        id: String,
    },
    RenderWrapper,
    RenderPill {
        container: String,
    },
    Click {
        target: String,
    },
    HideChatPill,
    ShowAssistant,
    ShowAssistantOnBtnClick,
    PreRender,
    CustomCss {
        bottom: Option<String>,
        right: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum TranscriptLine {
    Step(HostStep),
    Message(Value),
}

impl TranscriptLine {
    /// Blank lines and `#` comments yield `None`. Objects carrying a `step`
    /// key are host steps, everything else is posted to the page window.
    pub fn parse(line: &str) -> Result<Option<TranscriptLine>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let value = serde_json::from_str::<Value>(line)?;
        if value.get("step").is_some() {
            return Ok(Some(TranscriptLine::Step(serde_json::from_value(value)?)));
        }

        return Ok(Some(TranscriptLine::Message(value)));
    }
}

/// Drives a widget from a JSON lines transcript and writes every message the
/// widget posts into its iframe, one JSON object per line.
pub struct Replay {
    controller: WidgetController,
}

impl Replay {
    pub fn new(controller: WidgetController) -> Replay {
        return Replay { controller };
    }

    pub fn controller(&self) -> &WidgetController {
        return &self.controller;
    }

    pub async fn apply(&mut self, line: TranscriptLine) -> Result<()> {
        match line {
            TranscriptLine::Message(message) => {
                self.controller.page_mut().window.post_message(message);
                self.controller.pump().await;
                self.controller.settle().await;
            }
            TranscriptLine::Step(step) => {
                self.step(step).await?;
            }
        }

        return Ok(());
    }

    async fn step(&mut self, step: HostStep) -> Result<()> {
        tracing::debug!(step = ?step, "Replaying host step");

        match step {
            HostStep::AddContainer { id } => {
                self.controller.page_mut().add_container(&id);
            }
            HostStep::RenderWrapper => {
                self.controller.render_wrapper().await;
            }
            HostStep::RenderPill { container } => {
                self.controller.render_pill(container.as_str())?;
            }
            HostStep::Click { target } => {
                let el = self.controller.page().document.get_element_by_id(&target);
                match el {
                    Some(el) => {
                        if !self.controller.click(el) {
                            tracing::debug!(target = target.as_str(), "Click not handled");
                        }
                    }
                    None => {
                        tracing::warn!(target = target.as_str(), "Click target not found");
                    }
                }
            }
            HostStep::HideChatPill => {
                self.controller.hide_chat_pill();
            }
            HostStep::ShowAssistant => {
                self.controller.show_assistant();
            }
            HostStep::ShowAssistantOnBtnClick => {
                if let Some(handle) = self.controller.show_assistant_on_btn_click() {
                    handle.await?;
                }
            }
            HostStep::PreRender => {
                self.controller.pre_render_assistant();
            }
            HostStep::CustomCss { bottom, right } => {
                self.controller
                    .add_custom_css(CustomOffsets { bottom, right });
            }
        }

        return Ok(());
    }

    /// Returns how many transcript lines were applied. Unreadable or failing
    /// lines are logged and skipped.
    pub async fn run<R, W>(&mut self, reader: R, writer: &mut W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut line_number = 0;
        let mut applied = 0;

        while let Some(raw) = lines.next_line().await? {
            line_number += 1;

            let line = match TranscriptLine::parse(&raw) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(error = ?err, line_number, "Skipping unreadable transcript line");
                    continue;
                }
            };

            if let Err(err) = self.apply(line).await {
                tracing::warn!(error = ?err, line_number, "Transcript line failed");
                continue;
            }
            applied += 1;

            for message in self.controller.drain_frame_messages() {
                writer
                    .write_all(format!("{}\n", serde_json::to_string(&message)?).as_bytes())
                    .await?;
            }
        }

        writer.flush().await?;
        tracing::info!(applied, "Transcript replayed");

        return Ok(applied);
    }
}
