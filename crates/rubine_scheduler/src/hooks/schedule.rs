//! Hook kind markers.
//!
//! Each lifecycle point has a marker type implementing [`HookSchedule`], so
//! observers can be registered with
//! [`register_observer::<OnSystemCall>`](super::HooksAPI::register_observer),
//! or on several points at once with a tuple:
//! `register_observer::<(OnSystemAdd, OnSystemRemove)>`.

use core::fmt;

use variadics_please::all_tuples;

/// The four system lifecycle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    /// A system was registered.
    SystemAdd,
    /// A system was removed.
    SystemRemove,
    /// A system ran.
    SystemCall,
    /// A system was paused or unpaused.
    SystemChange,
}

impl HookKind {
    /// All kinds, in declaration order.
    pub const ALL: [HookKind; 4] = [
        HookKind::SystemAdd,
        HookKind::SystemRemove,
        HookKind::SystemCall,
        HookKind::SystemChange,
    ];
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::SystemAdd => "SystemAdd",
            HookKind::SystemRemove => "SystemRemove",
            HookKind::SystemCall => "SystemCall",
            HookKind::SystemChange => "SystemChange",
        };
        f.write_str(name)
    }
}

/// Marker type identifying a [`HookKind`] at compile time.
pub trait HookSchedule: 'static {
    /// The lifecycle point this marker stands for.
    const KIND: HookKind;
}

/// Hooks called after a system is registered.
///
/// Event data: [`SystemEvent::SystemAdd`](super::SystemEvent::SystemAdd)
pub struct OnSystemAdd;
impl HookSchedule for OnSystemAdd {
    const KIND: HookKind = HookKind::SystemAdd;
}

/// Hooks called once when a system is removed.
///
/// Event data: [`SystemEvent::SystemRemove`](super::SystemEvent::SystemRemove)
pub struct OnSystemRemove;
impl HookSchedule for OnSystemRemove {
    const KIND: HookKind = HookKind::SystemRemove;
}

/// Hooks called after every system run.
///
/// Event data: [`SystemEvent::SystemCall`](super::SystemEvent::SystemCall)
pub struct OnSystemCall;
impl HookSchedule for OnSystemCall {
    const KIND: HookKind = HookKind::SystemCall;
}

/// Hooks called when a system's paused flag flips.
///
/// Event data: [`SystemEvent::SystemChange`](super::SystemEvent::SystemChange)
pub struct OnSystemChange;
impl HookSchedule for OnSystemChange {
    const KIND: HookKind = HookKind::SystemChange;
}

/// Converts a marker or a tuple of markers into hook kinds.
pub trait IntoHookKinds {
    /// Returns the kinds for this type.
    fn hook_kinds() -> Vec<HookKind>;
}

impl<S: HookSchedule> IntoHookKinds for S {
    fn hook_kinds() -> Vec<HookKind> {
        vec![S::KIND]
    }
}

macro_rules! impl_into_hook_kinds_for_tuple {
    ($($S:ident),*) => {
        impl<$($S: HookSchedule),*> IntoHookKinds for ($($S,)*) {
            fn hook_kinds() -> Vec<HookKind> {
                vec![$($S::KIND),*]
            }
        }
    };
}

all_tuples!(impl_into_hook_kinds_for_tuple, 2, 4, S);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_marker_yields_one_kind() {
        assert_eq!(OnSystemCall::hook_kinds(), vec![HookKind::SystemCall]);
    }

    #[test]
    fn tuple_markers_keep_order() {
        assert_eq!(
            <(OnSystemRemove, OnSystemAdd)>::hook_kinds(),
            vec![HookKind::SystemRemove, HookKind::SystemAdd]
        );
    }
}
