//! Scripted input timelines: `"frame:action,frame:action"`.
//!
//! Actions use their [`Action::label`] names, so `2:toggle-flashlight` presses
//! the flashlight key on frame 2.

use shadowbox_input::{Action, AmbientStep, InputEvent, KeyBindings};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScriptError {
    #[error("malformed step {0:?}, expected frame:action")]
    Malformed(String),
    #[error("bad frame number in {0:?}")]
    Frame(String),
    #[error("unknown action {0:?}")]
    UnknownAction(String),
    #[error("no key is bound to {0}")]
    Unbound(&'static str),
}

/// One scheduled input.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub frame: u64,
    pub action: Action,
}

pub fn parse(script: &str) -> Result<Vec<Step>, ScriptError> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|step| {
            let (frame, label) = step
                .split_once(':')
                .ok_or_else(|| ScriptError::Malformed(step.to_string()))?;
            let frame = frame
                .trim()
                .parse()
                .map_err(|_| ScriptError::Frame(step.to_string()))?;
            let label = label.trim();
            let action = Action::from_label(label)
                .ok_or_else(|| ScriptError::UnknownAction(label.to_string()))?;
            Ok(Step { frame, action })
        })
        .collect()
}

/// Platform events that trigger `action` under `bindings`.
pub fn events_for(action: Action, bindings: &KeyBindings) -> Result<Vec<InputEvent>, ScriptError> {
    match action {
        Action::Quit => Ok(vec![InputEvent::Quit]),
        Action::AdjustAmbient(AmbientStep::Up) => Ok(vec![InputEvent::MouseWheel(1.0)]),
        Action::AdjustAmbient(AmbientStep::Down) => Ok(vec![InputEvent::MouseWheel(-1.0)]),
        _ => {
            let key = bindings
                .iter()
                .find(|(_, bound)| **bound == action)
                .map(|(key, _)| *key)
                .ok_or(ScriptError::Unbound(action.label()))?;
            Ok(vec![InputEvent::KeyDown(key), InputEvent::KeyUp(key)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowbox_input::Key;

    #[test]
    fn parses_steps_in_order() {
        let steps = parse("2:toggle-flashlight, 5:scroll-up,9:quit").unwrap();
        assert_eq!(
            steps,
            vec![
                Step {
                    frame: 2,
                    action: Action::ToggleFlashlight
                },
                Step {
                    frame: 5,
                    action: Action::AdjustAmbient(AmbientStep::Up)
                },
                Step {
                    frame: 9,
                    action: Action::Quit
                },
            ]
        );
    }

    #[test]
    fn empty_script_is_empty() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_steps() {
        assert!(matches!(parse("toggle-pause"), Err(ScriptError::Malformed(_))));
        assert!(matches!(parse("x:toggle-pause"), Err(ScriptError::Frame(_))));
        assert_eq!(
            parse("1:jump"),
            Err(ScriptError::UnknownAction("jump".into()))
        );
    }

    #[test]
    fn toggles_become_key_presses() {
        let bindings = KeyBindings::default();
        assert_eq!(
            events_for(Action::TogglePause, &bindings).unwrap(),
            vec![InputEvent::KeyDown(Key::F(1)), InputEvent::KeyUp(Key::F(1))]
        );
        assert_eq!(
            events_for(Action::AdjustAmbient(AmbientStep::Down), &bindings).unwrap(),
            vec![InputEvent::MouseWheel(-1.0)]
        );
    }

    #[test]
    fn unbound_action_is_reported() {
        let err = events_for(Action::ToggleWireframe, &KeyBindings::empty()).unwrap_err();
        assert_eq!(err, ScriptError::Unbound("toggle-wireframe"));
    }
}
