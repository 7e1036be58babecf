/// Expands to the full module path of the enclosing function.
#[macro_export]
macro_rules! function_path {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        // Trim the trailing "::f" left by the probe function.
        &name[..name.len() - 3]
    }};
}

/// Times the enclosing scope under the given label.
///
/// Expands to a [`ScopeTimer`](crate::ScopeTimer) bound to a local, so the
/// record is submitted when the scope ends. Compiles to nothing when the
/// `enabled` feature is turned off.
#[cfg(feature = "enabled")]
#[macro_export]
macro_rules! trace_scope {
    ($controller:expr, $name:expr) => {
        let _scope_timer = $crate::ScopeTimer::new(&$controller, $name);
    };
}

#[cfg(not(feature = "enabled"))]
#[macro_export]
macro_rules! trace_scope {
    ($controller:expr, $name:expr) => {};
}

/// Times the enclosing scope, labeled with the enclosing function's path.
#[cfg(feature = "enabled")]
#[macro_export]
macro_rules! trace_function {
    ($controller:expr) => {
        let _scope_timer = $crate::ScopeTimer::new(&$controller, $crate::function_path!());
    };
}

#[cfg(not(feature = "enabled"))]
#[macro_export]
macro_rules! trace_function {
    ($controller:expr) => {};
}

#[cfg(test)]
mod tests {
    #[test]
    fn function_path_names_the_enclosing_function() {
        let path = function_path!();
        assert!(
            path.ends_with("tests::function_path_names_the_enclosing_function"),
            "unexpected path: {}",
            path
        );
    }
}
