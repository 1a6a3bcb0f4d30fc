//! Link activation input

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    /// Primary button (usually left)
    #[default]
    Primary,
    /// Auxiliary button (usually middle/wheel)
    Auxiliary,
    /// Secondary button (usually right)
    Secondary,
    Other(i16),
}

impl MouseButton {
    /// Convert from a DOM button number
    pub fn from_number(n: i16) -> Self {
        match n {
            0 => Self::Primary,
            1 => Self::Auxiliary,
            2 => Self::Secondary,
            n => Self::Other(n),
        }
    }
}

/// An activated element, as reported by the host
#[derive(Debug, Clone, Default)]
pub struct LinkActivation {
    /// Tag name of the activated element
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub button: MouseButton,
    pub shift_key: bool,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
}

impl LinkActivation {
    /// Plain primary-button click on `<a href>`
    pub fn click(href: &str) -> Self {
        Self {
            tag: "a".to_string(),
            attrs: vec![("href".to_string(), href.to_string())],
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    /// Check if any modifier key is pressed
    pub fn any_modifier(&self) -> bool {
        self.shift_key || self.ctrl_key || self.alt_key || self.meta_key
    }
}
