//! Panic reporting helpers.
//!
//! Panics inside evaluators, subscribers and the engine loops are contained at
//! task boundaries. [`payload_message`] renders what was caught there;
//! [`install_hook`] makes sure the original location and a backtrace reach the
//! log as well, since by the time a boundary observes the panic the
//! panicking stack is gone.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{PanicHookInfo, take_hook};
use std::sync::Once;

static HOOK: Once = Once::new();

/// Renders a caught panic payload as text.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_string()
}

/// True once [`install_hook`] has run in this process.
pub fn hook_installed() -> bool {
    HOOK.is_completed()
}

/// Installs a process-wide panic hook that logs panics through `tracing`.
///
/// The record carries payload, location, thread name and a forced backtrace.
/// The previously installed hook still runs afterwards. Calling this more
/// than once has no further effect.
pub fn install_hook() {
    HOOK.call_once(|| {
        let previous = take_hook();
        std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let location = info
                    .location()
                    .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
                    .unwrap_or_else(|| "<unknown>".to_string());
                let thread = std::thread::current()
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "<unnamed>".to_string());

                tracing::error!(
                    target: "alertvisor::panic",
                    payload = %payload_message(info.payload()),
                    %location,
                    %thread,
                    "panic\n{}",
                    Backtrace::force_capture(),
                );
            }));
            previous(info);
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(payload_message(s.as_ref()), "static str");

        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(payload_message(s.as_ref()), "owned");

        let s: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(payload_message(s.as_ref()), "unknown panic");
    }

    #[test]
    fn test_install_hook_is_recorded() {
        install_hook();
        install_hook();
        assert!(hook_installed());
    }

    #[test]
    fn test_caught_panic_renders_payload() {
        let caught = std::panic::catch_unwind(|| panic!("rule {} exploded", 5)).unwrap_err();
        assert_eq!(payload_message(caught.as_ref()), "rule 5 exploded");
    }
}
