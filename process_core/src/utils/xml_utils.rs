use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

use quick_xml::{
    events::{BytesDecl, Event},
    Writer,
};

/// Result of a successful write step inside `write_inner_content` closures
pub(crate) const OK: io::Result<()> = Ok(());

///
/// Target of the PNML and PTML exports
///
/// Either an owned writer (created from any [`std::io::Write`]) or a borrowed, already configured
/// (e.g., indenting) [`quick_xml::Writer`].
#[allow(missing_debug_implementations)]
pub enum XMLWriterWrapper<'a, W> {
    /// Writer created for the export
    Owned(Writer<W>),
    /// Writer supplied by the caller
    Ref(&'a mut Writer<W>),
}

impl<'a, W> XMLWriterWrapper<'a, W> {
    /// The wrapped [`quick_xml::Writer`]
    pub fn to_xml_writer(&'a mut self) -> &'a mut Writer<W> {
        match self {
            XMLWriterWrapper::Owned(w) => w,
            XMLWriterWrapper::Ref(w) => w,
        }
    }
}

impl<W: Write> From<W> for XMLWriterWrapper<'_, W> {
    fn from(w: W) -> Self {
        Self::Owned(Writer::new(w))
    }
}

impl<'a, W> From<&'a mut Writer<W>> for XMLWriterWrapper<'a, W> {
    fn from(w: &'a mut Writer<W>) -> Self {
        Self::Ref(w)
    }
}

/// Create (or truncate) the file at `path` and wrap it in a writer indenting by 4 spaces
pub fn indented_file_writer<P: AsRef<Path>>(path: P) -> Result<Writer<File>, quick_xml::Error> {
    let file = File::create(path)?;
    Ok(Writer::new_with_indent(file, b' ', 4))
}

/// Write `<?xml version="1.0" encoding="UTF-8"?>`
pub fn write_xml_declaration<W: Write>(writer: &mut Writer<W>) -> io::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_into_plain_and_wrapped_writers() {
        let mut out: Vec<u8> = Vec::new();
        let mut wrapper: XMLWriterWrapper<'_, &mut Vec<u8>> = (&mut out).into();
        write_xml_declaration(wrapper.to_xml_writer()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>"
        );

        let mut writer = Writer::new(Vec::new());
        let mut wrapper: XMLWriterWrapper<'_, Vec<u8>> = (&mut writer).into();
        assert!(matches!(wrapper, XMLWriterWrapper::Ref(_)));
        write_xml_declaration(wrapper.to_xml_writer()).unwrap();
        assert!(!writer.into_inner().is_empty());
    }
}
