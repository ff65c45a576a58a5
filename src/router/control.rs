//! Per-control state, value scaling and transition classification

use std::fmt;
use tracing::{debug, error, warn};

use crate::actions::{build_action_list, ActionRegistry, BoundAction};
use crate::config::{ActionSpec, ControlSpec};
use crate::error::ConfigError;

/// Raw value of a released button
pub const BUTTON_RELEASED: u8 = 0;
/// Raw value of a pressed button
pub const BUTTON_PRESSED: u8 = 127;
/// Highest raw 7-bit value
pub const MAX_RAW_VALUE: u8 = 127;

/// Kind of a monitored control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Button,
    Knob,
}

impl ControlKind {
    /// Parse the `type` field of a control; names are case-sensitive
    pub fn from_name(control: u8, name: &str) -> Result<Self, ConfigError> {
        match name {
            "button" => Ok(ControlKind::Button),
            "knob" => Ok(ControlKind::Knob),
            _ => Err(ConfigError::UnknownControlType {
                control,
                kind: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKind::Button => write!(f, "button"),
            ControlKind::Knob => write!(f, "knob"),
        }
    }
}

/// Linear mapping of raw 0-127 input onto `[min_output, max_output]`
///
/// `max_output` may be below `min_output`, which inverts the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub min_output: i32,
    pub max_output: i32,
}

impl Scale {
    pub fn new(min_output: i32, max_output: i32) -> Self {
        Self {
            min_output,
            max_output,
        }
    }

    /// `round(raw / 127 * (max - min)) + min`, rounding half away from zero.
    ///
    /// The rounded offset never leaves `[0, max - min]`, so the result always
    /// lies within the output range and both ends are hit exactly.
    pub fn apply(&self, raw: u8) -> i32 {
        let span = f64::from(self.max_output) - f64::from(self.min_output);
        let offset = (f64::from(raw) / f64::from(MAX_RAW_VALUE) * span).round();
        (offset as i64 + i64::from(self.min_output)) as i32
    }
}

/// Result of comparing a raw value against the last observed one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Button 0 → 127
    Press,
    /// Button 127 → 0
    Release,
    /// Knob moved
    Change,
    /// Valid value that fires nothing
    Unchanged,
    /// Value outside what the control accepts; dropped without state change
    OutOfRange,
}

/// One monitored control-surface element
pub struct Control {
    number: u8,
    kind: ControlKind,
    last_value: u8,
    scale: Option<Scale>,
    on_press: Vec<BoundAction>,
    on_release: Vec<BoundAction>,
    on_change: Vec<BoundAction>,
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("number", &self.number)
            .field("kind", &self.kind)
            .field("last_value", &self.last_value)
            .field("scale", &self.scale)
            .field("on_press", &self.on_press)
            .field("on_release", &self.on_release)
            .field("on_change", &self.on_change)
            .finish()
    }
}

impl Control {
    /// A control with no actions and no scale
    pub fn new(number: u8, kind: ControlKind) -> Self {
        Self {
            number,
            kind,
            last_value: 0,
            scale: None,
            on_press: Vec::new(),
            on_release: Vec::new(),
            on_change: Vec::new(),
        }
    }

    /// Bind a control from its configuration
    ///
    /// Buttons bind `onPress`/`onRelease`, knobs bind `onChange`; lists that
    /// do not apply to the control's kind are ignored with a warning.
    pub fn from_spec(
        number: u8,
        spec: &ControlSpec,
        registry: &ActionRegistry,
    ) -> Result<Self, ConfigError> {
        let kind = ControlKind::from_name(number, &spec.control_type)?;
        let mut control = Self::new(number, kind);

        control.scale = match (spec.scale_range.as_slice(), kind) {
            ([], _) => None,
            ([min, max], ControlKind::Knob) => Some(Scale::new(*min, *max)),
            ([_, _], ControlKind::Button) => {
                return Err(ConfigError::ScaleOnButton { control: number })
            }
            (range, _) => {
                return Err(ConfigError::InvalidScaleRange {
                    control: number,
                    len: range.len(),
                })
            }
        };

        let build = |list: &'static str, specs: &[ActionSpec]| {
            build_action_list(number, list, specs, registry).map_err(|source| {
                ConfigError::ActionList {
                    control: number,
                    list,
                    source: Box::new(source),
                }
            })
        };

        match kind {
            ControlKind::Button => {
                control.on_press = build("onPress", &spec.on_press)?;
                control.on_release = build("onRelease", &spec.on_release)?;
                if !spec.on_change.is_empty() {
                    warn!(control = number, "onChange is not supported for buttons, ignoring");
                }
            }
            ControlKind::Knob => {
                control.on_change = build("onChange", &spec.on_change)?;
                if !spec.on_press.is_empty() || !spec.on_release.is_empty() {
                    warn!(control = number, "onPress/onRelease are not supported for knobs, ignoring");
                }
            }
        }

        debug!(
            control = number,
            kind = %kind,
            scale = ?control.scale,
            on_press = control.on_press.len(),
            on_release = control.on_release.len(),
            on_change = control.on_change.len(),
            "bound control"
        );

        Ok(control)
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn last_value(&self) -> u8 {
        self.last_value
    }

    pub fn scale_range(&self) -> Option<Scale> {
        self.scale
    }

    /// Output value for a raw value; unscaled controls pass the raw value through
    pub fn scale(&self, raw: u8) -> i32 {
        match self.scale {
            Some(scale) => scale.apply(raw),
            None => i32::from(raw),
        }
    }

    /// Classify `value` against the last observed value
    pub fn classify(&self, value: u8) -> Transition {
        if value > MAX_RAW_VALUE {
            return Transition::OutOfRange;
        }
        match self.kind {
            ControlKind::Button => match (self.last_value, value) {
                (_, v) if v != BUTTON_RELEASED && v != BUTTON_PRESSED => Transition::OutOfRange,
                (BUTTON_RELEASED, BUTTON_PRESSED) => Transition::Press,
                (BUTTON_PRESSED, BUTTON_RELEASED) => Transition::Release,
                _ => Transition::Unchanged,
            },
            ControlKind::Knob if value != self.last_value => Transition::Change,
            ControlKind::Knob => Transition::Unchanged,
        }
    }

    /// Process one raw value: run the matching actions, then record the value.
    ///
    /// Out-of-range values are dropped without touching `last_value`.
    pub fn handle(&mut self, value: u8) -> Transition {
        let transition = self.classify(value);
        let last_value = self.last_value;

        let actions = match transition {
            Transition::OutOfRange => {
                warn!(
                    control = self.number,
                    kind = %self.kind,
                    value,
                    "value out of range, ignoring event"
                );
                return transition;
            }
            Transition::Press => Some(("onPress", &self.on_press)),
            Transition::Release => Some(("onRelease", &self.on_release)),
            Transition::Change => Some(("onChange", &self.on_change)),
            Transition::Unchanged => None,
        };

        if let Some((list, actions)) = actions {
            debug!(
                control = self.number,
                list,
                value,
                last_value,
                actions = actions.len(),
                "dispatching"
            );
            dispatch(
                self.number,
                list,
                actions,
                self.scale(value),
                self.scale(last_value),
            );
        }

        self.last_value = value;
        transition
    }
}

/// Run every action in order; failures are logged and do not stop the list
fn dispatch(control: u8, list: &str, actions: &[BoundAction], value: i32, last_value: i32) {
    for action in actions {
        if let Err(err) = action.act(value, last_value) {
            error!(
                control,
                list,
                action = action.name(),
                value,
                last_value,
                "action failed: {:#}",
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(ControlKind::from_name(1, "button").unwrap(), ControlKind::Button);
        assert_eq!(ControlKind::from_name(1, "knob").unwrap(), ControlKind::Knob);

        let err = ControlKind::from_name(7, "Knob").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownControlType { control: 7, ref kind } if kind == "Knob"
        ));
    }

    #[test]
    fn test_scale_fixtures() {
        let percent = Scale::new(0, 100);
        assert_eq!(percent.apply(0), 0);
        assert_eq!(percent.apply(1), 1); // 0.79 rounds up
        assert_eq!(percent.apply(63), 50); // 49.61
        assert_eq!(percent.apply(64), 50); // 50.39
        assert_eq!(percent.apply(127), 100);

        let negative = Scale::new(0, -100);
        assert_eq!(negative.apply(1), -1); // -0.79 rounds away from zero
        assert_eq!(negative.apply(64), -50);
        assert_eq!(negative.apply(127), -100);

        let inverted = Scale::new(100, 0);
        assert_eq!(inverted.apply(0), 100);
        assert_eq!(inverted.apply(64), 50);
        assert_eq!(inverted.apply(127), 0);

        let centered = Scale::new(-10, 10);
        assert_eq!(centered.apply(0), -10);
        assert_eq!(centered.apply(63), 0); // 9.92
        assert_eq!(centered.apply(64), 0); // 10.08
        assert_eq!(centered.apply(127), 10);
    }

    #[test]
    fn test_scale_extreme_range() {
        let full = Scale::new(i32::MIN, i32::MAX);
        assert_eq!(full.apply(0), i32::MIN);
        assert_eq!(full.apply(127), i32::MAX);
    }

    #[test]
    fn test_unscaled_value_passes_through() {
        let control = Control::new(3, ControlKind::Knob);
        assert_eq!(control.scale(0), 0);
        assert_eq!(control.scale(99), 99);
        assert_eq!(control.scale(127), 127);
    }

    #[test]
    fn test_button_classification() {
        let mut control = Control::new(41, ControlKind::Button);

        assert_eq!(control.classify(0), Transition::Unchanged);
        assert_eq!(control.classify(64), Transition::OutOfRange);
        assert_eq!(control.handle(127), Transition::Press);
        assert_eq!(control.classify(127), Transition::Unchanged);
        assert_eq!(control.classify(1), Transition::OutOfRange);
        assert_eq!(control.handle(0), Transition::Release);
        assert_eq!(control.last_value(), 0);
    }

    #[test]
    fn test_knob_classification() {
        let mut control = Control::new(0, ControlKind::Knob);

        assert_eq!(control.classify(0), Transition::Unchanged);
        assert_eq!(control.handle(12), Transition::Change);
        assert_eq!(control.classify(12), Transition::Unchanged);
        assert_eq!(control.classify(200), Transition::OutOfRange);
    }

    proptest! {
        #[test]
        fn prop_scale_hits_both_ends(min in any::<i32>(), max in any::<i32>()) {
            let scale = Scale::new(min, max);
            prop_assert_eq!(scale.apply(0), min);
            prop_assert_eq!(scale.apply(127), max);
        }

        #[test]
        fn prop_scale_is_monotonic(
            min in -100_000i32..100_000,
            max in -100_000i32..100_000,
            a in 0u8..=127,
            b in 0u8..=127,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let scale = Scale::new(min, max);
            let step = i64::from(scale.apply(hi)) - i64::from(scale.apply(lo));
            let direction = i64::from(max) - i64::from(min);
            prop_assert!(step == 0 || step.signum() == direction.signum());
        }

        #[test]
        fn prop_scaled_value_stays_in_range(min in any::<i32>(), max in any::<i32>(), raw in 0u8..=127) {
            let value = Scale::new(min, max).apply(raw);
            prop_assert!(value >= min.min(max) && value <= min.max(max));
        }

        #[test]
        fn prop_button_rejects_intermediate_values(value in 1u8..127) {
            let mut control = Control::new(41, ControlKind::Button);
            prop_assert_eq!(control.handle(value), Transition::OutOfRange);
            prop_assert_eq!(control.last_value(), 0);
        }
    }
}
