/// Generates `impl axum::extract::FromRef<AppState> for $type`, cloning a
/// single field out of `AppState`. Keeps handler signatures down to
/// `State(x): State<FieldType>` instead of always extracting the whole
/// `AppState`.
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}

pub(crate) use impl_from_ref;
