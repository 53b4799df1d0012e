use std::{io::Write, path::Path};

use uuid::Uuid;

use crate::utils::xml_utils::{
    indented_file_writer, write_xml_declaration, XMLWriterWrapper, OK,
};

use super::process_tree_struct::{LeafLabel, Node, OperatorType, ProcessTree};

/// PTML tag of an operator
fn operator_tag(operator_type: OperatorType) -> &'static str {
    match operator_type {
        OperatorType::Sequence => "sequence",
        OperatorType::ExclusiveChoice => "xor",
        OperatorType::Concurrency => "and",
        OperatorType::Inclusive => "or",
        OperatorType::Loop => "xorLoop",
    }
}

/// Node as written to PTML: `(id, tag, name)` plus `(parent, child)` edges
///
/// Loops get an additional silent exit child.
fn collect_nodes(
    node: &Node,
    nodes: &mut Vec<(Uuid, &'static str, String)>,
    edges: &mut Vec<(Uuid, Uuid)>,
) {
    match node {
        Node::Leaf(leaf) => match &leaf.activity_label {
            LeafLabel::Activity(a) => nodes.push((leaf.uuid, "manualTask", a.clone())),
            LeafLabel::Tau => nodes.push((leaf.uuid, "automaticTask", String::new())),
        },
        Node::Operator(op) => {
            nodes.push((op.uuid, operator_tag(op.operator_type), String::new()));
            for child in &op.children {
                edges.push((op.uuid, *child.get_uuid()));
                collect_nodes(child, nodes, edges);
            }
            if op.operator_type == OperatorType::Loop {
                let exit = Uuid::new_v4();
                nodes.push((exit, "automaticTask", String::new()));
                edges.push((op.uuid, exit));
            }
        }
    }
}

///
/// Export a [`ProcessTree`] to the PTML format and write the result to the provided writer which implements into [`quick_xml::Writer`] / [`std::io::Write`]
///
/// Nodes are written in pre-order, followed by one `parentsNode` element per parent-child edge.
/// Loops are written with three children (do, redo and a silent exit).
pub fn export_process_tree_to_ptml<'a, W>(
    tree: &ProcessTree,
    into_writer: impl Into<XMLWriterWrapper<'a, W>>,
) -> Result<(), quick_xml::Error>
where
    W: Write + 'a,
{
    let mut xml_writer: XMLWriterWrapper<'_, W> = into_writer.into();
    let writer = xml_writer.to_xml_writer();

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    collect_nodes(&tree.root, &mut nodes, &mut edges);
    let root_id = tree.root.get_uuid().to_string();
    let tree_id = Uuid::new_v4().to_string();

    write_xml_declaration(writer)?;
    writer.create_element("ptml").write_inner_content(|writer| {
        writer
            .create_element("processTree")
            .with_attributes(vec![
                ("id", tree_id.as_str()),
                ("name", tree_id.as_str()),
                ("root", root_id.as_str()),
            ])
            .write_inner_content(|writer| {
                for (id, tag, name) in &nodes {
                    writer
                        .create_element(*tag)
                        .with_attributes(vec![
                            ("id", id.to_string().as_str()),
                            ("name", name.as_str()),
                        ])
                        .write_empty()?;
                }
                for (parent, child) in &edges {
                    writer
                        .create_element("parentsNode")
                        .with_attributes(vec![
                            ("id", Uuid::new_v4().to_string().as_str()),
                            ("sourceId", parent.to_string().as_str()),
                            ("targetId", child.to_string().as_str()),
                        ])
                        .write_empty()?;
                }
                OK
            })?;
        OK
    })?;
    Ok(())
}

/// Export a [`ProcessTree`] to a `.ptml` file (specified through path)
pub fn export_process_tree_to_ptml_path<P: AsRef<Path>>(
    tree: &ProcessTree,
    path: P,
) -> Result<(), quick_xml::Error> {
    let mut writer = indented_file_writer(path)?;
    export_process_tree_to_ptml(tree, &mut writer)
}

impl ProcessTree {
    /// Export process tree to a PTML file
    pub fn export_ptml<P: AsRef<Path>>(&self, path: P) -> Result<(), quick_xml::Error> {
        export_process_tree_to_ptml_path(self, path)
    }
}
