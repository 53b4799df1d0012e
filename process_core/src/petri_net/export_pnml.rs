use std::{
    io::{self, Write},
    path::Path,
};

use quick_xml::{events::BytesText, Writer};

use crate::utils::xml_utils::{indented_file_writer, XMLWriterWrapper, OK};

use super::petri_net_struct::{ArcType, Marking, PetriNet};

/// Write `<name><text>value</text></name>` style elements
fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    element: &str,
    value: &str,
) -> io::Result<()> {
    writer
        .create_element(element)
        .write_inner_content(|writer| {
            writer
                .create_element("text")
                .write_text_content(BytesText::new(value))?;
            OK
        })?;
    OK
}

fn write_marking<W: Write>(
    writer: &mut Writer<W>,
    marking: &Marking,
) -> io::Result<()> {
    writer
        .create_element("marking")
        .write_inner_content(|writer| {
            for (place_id, tokens) in marking.iter() {
                writer
                    .create_element("place")
                    .with_attribute(("idref", place_id.get_uuid().to_string().as_str()))
                    .write_inner_content(|writer| {
                        writer
                            .create_element("text")
                            .write_text_content(BytesText::new(tokens.to_string().as_str()))?;
                        OK
                    })?;
            }
            OK
        })?;
    OK
}

///
/// Export a [`PetriNet`] to the PNML format and write the result to the provided writer which implements into [`quick_xml::Writer`] / [`std::io::Write`]
///
/// Places and transitions are written in their stable (name, id) order. Invisible transitions
/// carry a `toolspecific` tag with activity `$invisible$`.
pub fn export_petri_net_to_pnml<'a, W>(
    pn: &PetriNet,
    into_writer: impl Into<XMLWriterWrapper<'a, W>>,
) -> Result<(), quick_xml::Error>
where
    W: Write + 'a,
{
    let mut xml_writer: XMLWriterWrapper<'_, W> = into_writer.into();
    let writer = xml_writer.to_xml_writer();
    let net_id = if pn.name.is_empty() {
        "net"
    } else {
        pn.name.as_str()
    };
    writer.create_element("pnml").write_inner_content(|writer| {
        writer
            .create_element("net")
            .with_attributes(vec![
                ("id", net_id),
                (
                    "type",
                    "http://www.pnml.org/version-2009/grammar/pnmlcoremodel",
                ),
            ])
            .write_inner_content(|writer| {
                write_text_element(writer, "name", net_id)?;
                writer
                    .create_element("page")
                    .with_attribute(("id", "n0"))
                    .write_inner_content(|writer| {
                        for place in pn.sorted_places() {
                            let id = place.id().get_uuid().to_string();
                            writer
                                .create_element("place")
                                .with_attribute(("id", id.as_str()))
                                .write_inner_content(|writer| {
                                    write_text_element(writer, "name", &place.name)?;
                                    let tokens = pn
                                        .initial_marking
                                        .as_ref()
                                        .map(|m| m.get(&place.id()))
                                        .unwrap_or(0);
                                    if tokens > 0 {
                                        write_text_element(
                                            writer,
                                            "initialMarking",
                                            &tokens.to_string(),
                                        )?;
                                    }
                                    OK
                                })?;
                        }
                        for transition in pn.sorted_transitions() {
                            let id = transition.id().get_uuid().to_string();
                            writer
                                .create_element("transition")
                                .with_attribute(("id", id.as_str()))
                                .write_inner_content(|writer| {
                                    write_text_element(
                                        writer,
                                        "name",
                                        transition.label.as_deref().unwrap_or(&transition.name),
                                    )?;
                                    if transition.is_silent() {
                                        writer
                                            .create_element("toolspecific")
                                            .with_attributes(vec![
                                                ("tool", "ProM"),
                                                ("version", "6.4"),
                                                ("activity", "$invisible$"),
                                                ("localNodeID", id.as_str()),
                                            ])
                                            .write_empty()?;
                                    }
                                    OK
                                })?;
                        }
                        for (i, arc) in pn.arcs.iter().enumerate() {
                            let (source_id, target_id) = match arc.from_to {
                                ArcType::PlaceTransition(from, to) => (from, to),
                                ArcType::TransitionPlace(from, to) => (from, to),
                            };
                            writer
                                .create_element("arc")
                                .with_attribute(("id", format!("arc{}", i).as_str()))
                                .with_attribute(("source", source_id.to_string().as_str()))
                                .with_attribute(("target", target_id.to_string().as_str()))
                                .write_inner_content(|writer| {
                                    write_text_element(
                                        writer,
                                        "inscription",
                                        &arc.weight.to_string(),
                                    )
                                })?;
                        }
                        OK
                    })?;

                if let Some(final_markings) = &pn.final_markings {
                    writer
                        .create_element("finalmarkings")
                        .write_inner_content(|writer| {
                            for marking in final_markings {
                                write_marking(writer, marking)?;
                            }
                            OK
                        })?;
                }
                OK
            })?;
        OK
    })?;
    Ok(())
}

/// Export a [`PetriNet`] to a `.pnml` file (specified through path)
///
/// Also consider using [`PetriNet::export_pnml`] for convenience or [`export_petri_net_to_pnml`] for more control.
pub fn export_petri_net_to_pnml_path<P: AsRef<Path>>(
    pn: &PetriNet,
    path: P,
) -> Result<(), quick_xml::Error> {
    let mut writer = indented_file_writer(path)?;
    export_petri_net_to_pnml(pn, &mut writer)
}

#[cfg(test)]
mod test {
    use super::export_petri_net_to_pnml;
    use crate::petri_net::petri_net_struct::{ArcType, PetriNet};

    #[test]
    fn test_export_pnml_to_writer() -> Result<(), quick_xml::Error> {
        let mut pn = PetriNet::with_name("example");
        let p = pn.add_place("source");
        let q = pn.add_place("sink");
        let t = pn.add_transition("t", Some("Register".into()));
        let tau = pn.add_transition("tau", None);
        pn.add_arc(ArcType::place_to_transition(p, t), None).unwrap();
        pn.add_arc(ArcType::transition_to_place(t, q), Some(3))
            .unwrap();
        pn.add_arc(ArcType::place_to_transition(q, tau), None)
            .unwrap();
        pn.initial_marking = Some([(p, 1)].into_iter().collect());
        pn.final_markings = Some(vec![[(q, 3)].into_iter().collect()]);

        let mut out: Vec<u8> = Vec::new();
        export_petri_net_to_pnml(&pn, &mut out)?;
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.starts_with("<pnml><net"));
        assert!(xml.contains("<text>Register</text>"));
        assert!(xml.contains("<initialMarking><text>1</text></initialMarking>"));
        assert!(xml.contains("activity=\"$invisible$\""));
        assert_eq!(xml.matches("activity=\"$invisible$\"").count(), 1);
        assert!(xml.contains("<inscription><text>3</text></inscription>"));
        assert_eq!(xml.matches("<arc ").count(), 3);
        assert!(xml.contains("<finalmarkings><marking>"));
        Ok(())
    }
}
