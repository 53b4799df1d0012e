use crate::petri_net::petri_net_struct::{ArcType, Marking, PetriNet, PlaceID, TransitionID};

use super::process_tree_struct::{LeafLabel, Node, OperatorType, ProcessTree, ProcessTreeError};

/// Name of the place holding the initial token of a converted tree
pub const SOURCE_PLACE: &str = "source";
/// Name of the place holding the final token of a converted tree
pub const SINK_PLACE: &str = "sink";

struct TreeToNet {
    net: PetriNet,
    next_id: usize,
}

impl TreeToNet {
    fn fresh(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn place(&mut self) -> PlaceID {
        let id = self.fresh();
        self.net.add_place(format!("p_{}", id))
    }

    fn silent(&mut self, kind: &str) -> TransitionID {
        let id = self.fresh();
        self.net.add_transition(format!("{}_{}", kind, id), None)
    }

    fn consume(&mut self, places: &[PlaceID], t: TransitionID) -> Result<(), ProcessTreeError> {
        for p in places {
            self.net.add_arc(ArcType::place_to_transition(*p, t), None)?;
        }
        Ok(())
    }

    fn produce(&mut self, t: TransitionID, places: &[PlaceID]) -> Result<(), ProcessTreeError> {
        for p in places {
            self.net.add_arc(ArcType::transition_to_place(t, *p), None)?;
        }
        Ok(())
    }

    /// Build the sub-net of `node` moving a token from `from` to `to`
    fn convert(&mut self, node: &Node, from: PlaceID, to: PlaceID) -> Result<(), ProcessTreeError> {
        let op = match node {
            Node::Leaf(leaf) => {
                let t = match &leaf.activity_label {
                    LeafLabel::Activity(a) => self.net.add_transition(a.clone(), Some(a.clone())),
                    LeafLabel::Tau => self.silent("tau"),
                };
                self.consume(&[from], t)?;
                return self.produce(t, &[to]);
            }
            Node::Operator(op) => op,
        };

        match op.operator_type {
            OperatorType::Sequence => {
                let mut current = from;
                for (i, child) in op.children.iter().enumerate() {
                    let next = if i + 1 == op.children.len() {
                        to
                    } else {
                        self.place()
                    };
                    self.convert(child, current, next)?;
                    current = next;
                }
            }
            // Children share the border places
            OperatorType::ExclusiveChoice => {
                for child in &op.children {
                    self.convert(child, from, to)?;
                }
            }
            OperatorType::Concurrency => {
                let split = self.silent("tau_split");
                let join = self.silent("tau_join");
                self.consume(&[from], split)?;
                self.produce(join, &[to])?;
                for child in &op.children {
                    let child_in = self.place();
                    let child_out = self.place();
                    self.produce(split, &[child_in])?;
                    self.consume(&[child_out], join)?;
                    self.convert(child, child_in, child_out)?;
                }
            }
            // Every child is started or skipped. `none_started` holds a token until the first
            // child starts, `some_started` afterwards; the join needs `some_started`.
            OperatorType::Inclusive => {
                let split = self.silent("tau_split");
                let join = self.silent("tau_join");
                let none_started = self.place();
                let some_started = self.place();
                self.consume(&[from], split)?;
                self.produce(split, &[none_started])?;
                self.consume(&[some_started], join)?;
                self.produce(join, &[to])?;
                for child in &op.children {
                    let pending = self.place();
                    let child_in = self.place();
                    let done = self.place();
                    self.produce(split, &[pending])?;
                    self.consume(&[done], join)?;

                    let start_first = self.silent("or_start_first");
                    self.consume(&[pending, none_started], start_first)?;
                    self.produce(start_first, &[child_in, some_started])?;
                    let start_more = self.silent("or_start");
                    self.consume(&[pending, some_started], start_more)?;
                    self.produce(start_more, &[child_in, some_started])?;
                    let skip = self.silent("or_skip");
                    self.consume(&[pending], skip)?;
                    self.produce(skip, &[done])?;

                    self.convert(child, child_in, done)?;
                }
            }
            OperatorType::Loop => {
                let (Some(do_part), Some(redo_part)) = (op.children.first(), op.children.get(1))
                else {
                    return Err(ProcessTreeError::WrongArity {
                        node: op.uuid,
                        operator_type: op.operator_type,
                        children: op.children.len(),
                    });
                };
                let do_in = self.place();
                let do_out = self.place();
                let enter = self.silent("loop_enter");
                let exit = self.silent("loop_exit");
                self.consume(&[from], enter)?;
                self.produce(enter, &[do_in])?;
                self.consume(&[do_out], exit)?;
                self.produce(exit, &[to])?;
                self.convert(do_part, do_in, do_out)?;
                self.convert(redo_part, do_out, do_in)?;
            }
        }
        Ok(())
    }
}

///
/// Convert a [`ProcessTree`] into an equivalent [`PetriNet`]
///
/// The net has a single `source` place (initial marking `{source: 1}`) and a single `sink`
/// place (final marking `{sink: 1}`). Visible leaves become transitions named and labelled by
/// their activity; operators only add silent transitions:
///
/// * sequence: children chained through fresh places,
/// * exclusive choice: children share their input and output place,
/// * concurrency: silent split and join around one place pair per child,
/// * inclusive choice: silent split and join, each child is started or skipped and the join
///   is guarded so that at least one child is started,
/// * loop: silent enter and exit around `do`, `redo` leads from the end of `do` back to its start.
///
/// The tree is validated first.
pub fn convert_process_tree_to_petri_net(
    tree: &ProcessTree,
) -> Result<(PetriNet, Marking, Marking), ProcessTreeError> {
    tree.validate()?;
    let mut builder = TreeToNet {
        net: PetriNet::with_name("process_tree"),
        next_id: 0,
    };
    let source = builder.net.add_place(SOURCE_PLACE);
    let sink = builder.net.add_place(SINK_PLACE);
    builder.convert(&tree.root, source, sink)?;

    let mut net = builder.net;
    let im: Marking = [(source, 1)].into_iter().collect();
    let fm: Marking = [(sink, 1)].into_iter().collect();
    net.initial_marking = Some(im.clone());
    net.final_markings = Some(vec![fm.clone()]);
    Ok((net, im, fm))
}

impl ProcessTree {
    /// See [`convert_process_tree_to_petri_net`]
    pub fn to_petri_net(&self) -> Result<(PetriNet, Marking, Marking), ProcessTreeError> {
        convert_process_tree_to_petri_net(self)
    }
}
