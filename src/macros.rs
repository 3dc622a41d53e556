/// Builds a mutation payload: a `Vec<(String, Operand)>` of column/value
/// pairs.
///
/// Values go through [`crate::ast::IntoOperand`], so scalars bind as
/// parameters and [`brook_core::Raw`] markers interpolate verbatim:
///
/// ```ignore
/// let payload = row! {
///     "name" => "John",
///     "status" => "active",
///     "visits" => raw("visits + 1"),
/// };
/// ```
#[macro_export]
macro_rules! row {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::ast::Operand)>::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        ::std::vec![
            $(
                (
                    ::std::string::ToString::to_string(&$column),
                    $crate::ast::IntoOperand::into_operand($value),
                )
            ),+
        ]
    };
}
