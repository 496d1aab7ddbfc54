//! Writing a reply into the open conversation and sending it.

use tracing::{debug, info, warn};

use crate::browser::{Locator, Surface, selectors};
use crate::error::BrowserError;
use crate::pacing::{PacePoint, Pacer};
use crate::pipeline::types::ReplyDraft;

/// How a delivery attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The send control was clicked.
    SendControl,
    /// No send control resolved; Enter was pressed in the input.
    EnterKey,
    /// No input surface resolved, or the text could not be entered.
    Failed,
}

impl DeliveryOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Type `draft` into the reply input and trigger send.
///
/// When keystrokes are rejected the input is filled by page script instead.
/// Never returns an error: every UI failure maps to [`DeliveryOutcome::Failed`].
pub async fn deliver<S: Surface + ?Sized>(
    surface: &S,
    locator: &Locator,
    pacer: &Pacer,
    draft: &ReplyDraft,
) -> DeliveryOutcome {
    let Some(input) = locator.locate(surface, &selectors::reply_input(), None).await else {
        warn!("No reply input found");
        return DeliveryOutcome::Failed;
    };

    if let Err(e) = surface.click(&input).await {
        debug!(error = %e, "Focus click on reply input failed");
    }
    if let Err(e) = surface.clear(&input).await {
        debug!(error = %e, "Clearing reply input failed");
    }

    if let Err(e) = type_paced(surface, &input, pacer, &draft.body).await {
        warn!(error = %e, "Typing into reply input failed, filling by script");
        if let Err(e) = surface.set_text_content(&input, &draft.body).await {
            warn!(error = %e, "Script fill of reply input failed");
            return DeliveryOutcome::Failed;
        }
    }
    pacer.pause(PacePoint::BeforeSend).await;

    if let Some(send) = locator.locate(surface, &selectors::send_control(), None).await {
        match surface.click(&send).await {
            Ok(()) => {
                info!(chars = draft.body.chars().count(), "Reply sent");
                return DeliveryOutcome::SendControl;
            }
            Err(e) => warn!(error = %e, "Send control click failed, pressing Enter"),
        }
    } else {
        debug!("No send control found, pressing Enter");
    }

    match surface.press_enter(&input).await {
        Ok(()) => {
            info!(chars = draft.body.chars().count(), "Reply sent with Enter");
            DeliveryOutcome::EnterKey
        }
        Err(e) => {
            warn!(error = %e, "Enter key fallback failed");
            DeliveryOutcome::Failed
        }
    }
}

async fn type_paced<S: Surface + ?Sized>(
    surface: &S,
    input: &S::Node,
    pacer: &Pacer,
    text: &str,
) -> Result<(), BrowserError> {
    for ch in text.chars() {
        let mut buf = [0u8; 4];
        surface.type_text(input, ch.encode_utf8(&mut buf)).await?;
        pacer.pause(PacePoint::Keystroke).await;
    }
    Ok(())
}
