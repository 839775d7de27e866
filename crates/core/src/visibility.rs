/// Console visibility state and the controller that applies it
use std::fmt;
use std::str::FromStr;

/// Whether the console window is currently shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Hidden,
}

impl Visibility {
    pub fn is_shown(self) -> bool {
        self == Visibility::Shown
    }

    pub fn toggled(self) -> Self {
        match self {
            Visibility::Shown => Visibility::Hidden,
            Visibility::Hidden => Visibility::Shown,
        }
    }
}

impl FromStr for Visibility {
    type Err = ();

    /// Parses the CLI spelling: `visible` or `hidden`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visible" => Ok(Visibility::Shown),
            "hidden" => Ok(Visibility::Hidden),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Shown => write!(f, "visible"),
            Visibility::Hidden => write!(f, "hidden"),
        }
    }
}

/// Something that can show or hide the console
pub trait ConsoleDisplay {
    fn set_visible(&self, visible: bool);
}

/// Display used when there is no console window to manage
#[derive(Debug, Default)]
pub struct NullDisplay;

impl ConsoleDisplay for NullDisplay {
    fn set_visible(&self, _visible: bool) {}
}

/// Tracks the console visibility and pushes changes to the display
pub struct VisibilityController<D: ConsoleDisplay> {
    state: Visibility,
    display: D,
}

impl<D: ConsoleDisplay> VisibilityController<D> {
    /// Wrap a display whose window currently has the given visibility
    pub fn new(display: D, current: Visibility) -> Self {
        Self {
            state: current,
            display,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.state
    }

    /// Flip the state and apply it
    pub fn toggle(&mut self) -> Visibility {
        self.state = self.state.toggled();
        self.apply();
        tracing::debug!("Console is now {}", self.state);
        self.state
    }

    /// Move to `target`, touching the display only when it changes
    pub fn set(&mut self, target: Visibility) {
        if self.state != target {
            self.toggle();
        }
    }

    /// Push the current state to the display
    pub fn apply(&self) {
        self.display.set_visible(self.state.is_shown());
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}
