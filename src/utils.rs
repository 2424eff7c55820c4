use std::{error, fmt, result};

#[derive(Debug)]
pub struct VsError {
    msg: String,
}
impl VsError {
    pub(crate) fn new(msg: impl Into<String>) -> VsError {
        VsError { msg: msg.into() }
    }
    pub(crate) fn err<T>(msg: impl Into<String>) -> VsResult<T> {
        Err(VsError::new(msg))
    }
    pub fn get_msg(&self) -> &str {
        &self.msg
    }
}
impl fmt::Display for VsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}
impl error::Error for VsError {}
impl From<serde_json::Error> for VsError {
    fn from(e: serde_json::Error) -> Self {
        VsError::new(format!("invalid configuration: {e}"))
    }
}
pub type VsResult<T> = result::Result<T, VsError>;

/// Linear interpolation between `a` (at `t = 0`) and `b` (at `t = 1`).
#[inline]
pub fn interpolate(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Moves `current` towards `target` without overshooting.
/// Rising values move by at most `amount_up`, falling values by at most `amount_down`.
#[inline]
pub fn move_towards(current: f64, target: f64, amount_up: f64, amount_down: f64) -> f64 {
    if current < target {
        (current + amount_up).min(target)
    } else {
        (current - amount_down).max(target)
    }
}
