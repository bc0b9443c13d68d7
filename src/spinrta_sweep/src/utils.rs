use std::fmt;

/// Formats the elements of an iterable separated by `,` without spaces.
pub struct CommaSeparatedNoSpace<T>(pub T);
impl<T> fmt::Display for CommaSeparatedNoSpace<T>
where
    T: Clone + IntoIterator,
    T::Item: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut it = self.0.clone().into_iter();
        if let Some(e) = it.next() {
            write!(f, "{e}")?;
            for e in it {
                write!(f, ",{e}")?;
            }
        }
        Ok(())
    }
}

/// Formats `Some(x)` as `x` and `None` as the given placeholder.
pub struct OrElse<'a, T>(pub Option<T>, pub &'a str);
impl<T> fmt::Display for OrElse<'_, T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(x) => x.fmt(f),
            None => f.write_str(self.1),
        }
    }
}

/// Formats a CSV field, quoting it if it contains a separator, a quote, or a
/// line break. Embedded quotes are doubled.
pub struct CsvField<T>(pub T);
impl<T> fmt::Display for CsvField<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.0.to_string();
        if text.contains([',', '"', '\n', '\r']) {
            write!(f, "\"{}\"", text.replace('"', "\"\""))
        } else {
            f.write_str(&text)
        }
    }
}
