//! Spoken wording for approved alerts.

use crate::models::Direction;
use crate::trend::Trend;

/// Opening word of every priority-1 message.
pub const URGENT_MARKER: &str = "Warning!";
pub const CAUTION_MARKER: &str = "Caution!";

/// Objects at or above this urgency mention that they are closing in.
const APPROACHING_MAX_PRIORITY: u8 = 3;

pub fn render(label: &str, direction: Direction, priority: u8, distance: f64, trend: Trend) -> String {
    let approaching = trend == Trend::Approaching && priority <= APPROACHING_MAX_PRIORITY;
    let subject = if approaching {
        format!("{label} approaching,")
    } else {
        label.to_string()
    };

    match priority {
        1 => format!("{URGENT_MARKER} {subject} very close!"),
        2 => format!("{CAUTION_MARKER} {subject} about a meter away"),
        3 if distance < 2.0 => format!("{subject} {}", direction.phrase()),
        3 => format!("{subject} {} meters away", distance.trunc() as u64),
        _ => label.to_string(),
    }
}

/// Fold ranked messages into one utterance.
pub fn combine(messages: &[String]) -> String {
    let spoken: Vec<&str> = messages
        .iter()
        .map(|message| message.trim())
        .filter(|message| !message.is_empty())
        .collect();

    match spoken.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{first}, and {second}"),
        many => many.join(". "),
    }
}
