/// Emite una línea de C con la sangría actual del contexto.
///
/// El contexto debe tener un campo `output` que implemente
/// [`std::fmt::Write`] y un campo `indent` con el nivel de anidamiento.
macro_rules! emit {
    ($self:expr) => {
        writeln!($self.output)
    };

    ($self:expr, $($format:tt)*) => {{
        write!($self.output, "{:width$}", "", width = 4 * $self.indent)?;
        writeln!($self.output, $($format)*)
    }};
}
