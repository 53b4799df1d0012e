use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use uuid::Uuid;

use crate::petri_net::petri_net_struct::StructureError;

///
/// Leaf in a process tree
///
#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub enum LeafLabel {
    /// Non-silent activity leaf
    Activity(String),
    /// Silent activity leaf
    Tau,
}

///
/// Errors of malformed process trees
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessTreeError {
    /// Operator with a number of children its type does not allow
    WrongArity {
        /// Operator node
        node: Uuid,
        /// Type of the operator
        operator_type: OperatorType,
        /// Number of children
        children: usize,
    },
    /// Children can only be added to operators
    LeafWithChildren(Uuid),
    /// Two nodes of the tree share an identifier
    DuplicateNode(Uuid),
    /// The Petri net built from the tree is malformed
    Structure(StructureError),
}

impl Display for ProcessTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessTreeError::WrongArity {
                node,
                operator_type,
                children,
            } => write!(
                f,
                "{:?} operator {} has {} children (expected {})",
                operator_type,
                node,
                children,
                operator_type.arity_description()
            ),
            ProcessTreeError::LeafWithChildren(id) => {
                write!(f, "Leaf {} can not have children", id)
            }
            ProcessTreeError::DuplicateNode(id) => write!(f, "Node {} occurs more than once", id),
            ProcessTreeError::Structure(e) => write!(f, "Malformed Petri net: {}", e),
        }
    }
}

impl std::error::Error for ProcessTreeError {}

impl From<StructureError> for ProcessTreeError {
    fn from(e: StructureError) -> Self {
        Self::Structure(e)
    }
}

///
/// Node in a process tree
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    /// Operator node of a process tree
    Operator(Operator),
    /// Leaf node of a process tree
    Leaf(Leaf),
}

impl Node {
    ///
    /// Returns the identifier of a node in a process tree
    ///
    pub fn get_uuid(&self) -> &Uuid {
        match self {
            Node::Operator(op) => &op.uuid,
            Node::Leaf(leaf) => &leaf.uuid,
        }
    }

    ///
    /// Creates a new [`Node::Operator`] with the given [`OperatorType`]
    ///
    pub fn new_operator(op_type: OperatorType) -> Self {
        Node::Operator(Operator::new(op_type))
    }

    /// Creates a new [`Node::Operator`] with the given children
    pub fn operator(op_type: OperatorType, children: Vec<Node>) -> Self {
        let mut op = Operator::new(op_type);
        op.children = children;
        Node::Operator(op)
    }

    ///
    /// Creates a new non-silent or silent leaf [`Node`]
    ///
    pub fn new_leaf(leaf_label: Option<String>) -> Self {
        Node::Leaf(Leaf::new(leaf_label))
    }

    /// Non-silent leaf
    pub fn activity<S: Into<String>>(label: S) -> Self {
        Self::new_leaf(Some(label.into()))
    }

    /// Silent leaf
    pub fn tau() -> Self {
        Self::new_leaf(None)
    }

    ///
    /// Adds a node as child if the node is an operator node
    ///
    pub fn add_child(&mut self, child: Node) -> Result<(), ProcessTreeError> {
        match self {
            Node::Operator(op) => {
                op.children.push(child);
                Ok(())
            }
            Node::Leaf(leaf) => Err(ProcessTreeError::LeafWithChildren(leaf.uuid)),
        }
    }

    ///
    /// Returns `true` if a loop operator has exactly two children (do and redo) and all other
    /// operators have at least two children.
    ///
    pub fn check_children_valid(&self) -> bool {
        match self {
            Node::Operator(op) => op.operator_type.accepts_arity(op.children.len()),
            Node::Leaf(_) => true,
        }
    }

    /// Whether this node is a silent leaf
    pub fn is_tau(&self) -> bool {
        matches!(
            self,
            Node::Leaf(Leaf {
                activity_label: LeafLabel::Tau,
                ..
            })
        )
    }

    ///
    /// Merge nested operators of the same type and unwrap operators with a single child
    ///
    /// Loops are never merged as their children have different roles. The language of the
    /// subtree is unchanged.
    pub fn flatten(self) -> Node {
        match self {
            Node::Leaf(_) => self,
            Node::Operator(op) => {
                let op_type = op.operator_type;
                let mut children = Vec::new();
                for child in op.children.into_iter().map(Node::flatten) {
                    match child {
                        Node::Operator(inner)
                            if op_type != OperatorType::Loop && inner.operator_type == op_type =>
                        {
                            children.extend(inner.children);
                        }
                        c => children.push(c),
                    }
                }
                if op_type != OperatorType::Loop && children.len() == 1 {
                    if let Some(only) = children.pop() {
                        return only;
                    }
                }
                Node::Operator(Operator {
                    uuid: op.uuid,
                    operator_type: op_type,
                    children,
                })
            }
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Leaf(leaf) => match &leaf.activity_label {
                LeafLabel::Activity(a) => write!(f, "'{}'", a),
                LeafLabel::Tau => write!(f, "tau"),
            },
            Node::Operator(op) => {
                write!(f, "{}( ", op.operator_type.symbol())?;
                for (i, child) in op.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, " )")
            }
        }
    }
}

///
/// Operator type enum for [`Operator`]
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OperatorType {
    /// Sequence operator
    Sequence,
    /// Exclusive choice operator
    ExclusiveChoice,
    /// Concurrency operator
    Concurrency,
    /// Inclusive choice (or) operator: any non-empty subset of the children, concurrently
    Inclusive,
    /// Loop operator: first child (do), then optionally second child (redo) followed by do again
    Loop,
}

impl OperatorType {
    /// Short symbol used when printing trees
    pub fn symbol(&self) -> &'static str {
        match self {
            OperatorType::Sequence => "->",
            OperatorType::ExclusiveChoice => "X",
            OperatorType::Concurrency => "+",
            OperatorType::Inclusive => "O",
            OperatorType::Loop => "*",
        }
    }

    /// Whether an operator of this type may have `children` children
    pub fn accepts_arity(&self, children: usize) -> bool {
        match self {
            OperatorType::Loop => children == 2,
            _ => children >= 2,
        }
    }

    fn arity_description(&self) -> &'static str {
        match self {
            OperatorType::Loop => "exactly 2",
            _ => "at least 2",
        }
    }
}

///
/// Process tree struct that contains [`Node`] as root
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTree {
    /// The root of the process tree
    pub root: Node,
}

impl ProcessTree {
    ///
    /// Initializes the process tree with the given node as root
    ///
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    ///
    /// Check that all operators have the right number of children and that node ids are unique
    ///
    pub fn validate(&self) -> Result<(), ProcessTreeError> {
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut stack: Vec<&Node> = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !seen.insert(*node.get_uuid()) {
                return Err(ProcessTreeError::DuplicateNode(*node.get_uuid()));
            }
            if let Node::Operator(op) = node {
                if !node.check_children_valid() {
                    return Err(ProcessTreeError::WrongArity {
                        node: op.uuid,
                        operator_type: op.operator_type,
                        children: op.children.len(),
                    });
                }
                stack.extend(op.children.iter());
            }
        }
        Ok(())
    }

    ///
    /// Returns `true` if all nodes have the right number of children and no node id repeats
    ///
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    ///
    /// Returns all descendant [`Leaf`]
    ///
    pub fn find_all_leaves(&self) -> Vec<&Leaf> {
        let mut result: Vec<&Leaf> = Vec::new();

        let mut curr_operators: Vec<&Operator> = Vec::new();
        match &self.root {
            Node::Operator(op) => curr_operators.push(op),
            Node::Leaf(leaf) => result.push(leaf),
        };

        let mut next_operators = Vec::new();

        while !curr_operators.is_empty() {
            curr_operators.iter().for_each(|op| {
                op.children.iter().for_each(|child| match child {
                    Node::Operator(op) => next_operators.push(op),
                    Node::Leaf(leaf) => result.push(leaf),
                })
            });

            curr_operators = next_operators;
            next_operators = Vec::new();
        }

        result
    }

    ///
    /// Returns all `Uuid`s of all nodes in the tree
    ///
    pub fn find_all_node_uuids(&self) -> Vec<&Uuid> {
        let mut result = vec![self.root.get_uuid()];
        if let Node::Operator(op) = &self.root {
            result.extend(op.find_all_descendants_uuids());
        }
        result
    }

    /// Number of labelled leaves per activity
    pub fn activities(&self) -> BTreeMap<&str, usize> {
        let mut result = BTreeMap::new();
        for leaf in self.find_all_leaves() {
            if let LeafLabel::Activity(a) = &leaf.activity_label {
                *result.entry(a.as_str()).or_default() += 1;
            }
        }
        result
    }

    /// See [`Node::flatten`]
    pub fn flatten(self) -> Self {
        Self::new(self.root.flatten())
    }
}

impl Display for ProcessTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)
    }
}

///
/// An operator node in a process tree
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    /// The node ID
    pub uuid: Uuid,
    /// The [`OperatorType`] of the tree itself
    pub operator_type: OperatorType,
    /// The children nodes of the operator node
    pub children: Vec<Node>,
}

impl Operator {
    ///
    /// A constructor for the struct that initializes with the given [`OperatorType`] and
    /// otherwise a fresh [`Uuid`] and an empty list of children
    ///
    pub fn new(operator_type: OperatorType) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            operator_type,
            children: Vec::new(),
        }
    }

    ///
    /// Returns all descendant [`Node`]'s Uuids
    ///
    pub fn find_all_descendants_uuids(&self) -> Vec<&Uuid> {
        let mut result: Vec<&Uuid> = Vec::new();

        self.children.iter().for_each(|child| match child {
            Node::Operator(op) => {
                result.push(child.get_uuid());
                result.extend(op.find_all_descendants_uuids());
            }
            Node::Leaf(_) => {
                result.push(child.get_uuid());
            }
        });

        result
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
///
/// A leaf in a process tree
///
pub struct Leaf {
    /// The identifier of the leaf
    pub uuid: Uuid,
    /// The silent or non-silent activity label [`LeafLabel`]
    pub activity_label: LeafLabel,
}

impl Leaf {
    ///
    /// Creates a new [`Leaf`] either by using a given label or making it silent if a label
    /// is missing
    ///
    pub fn new(leaf_label: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            activity_label: match leaf_label {
                Some(label) => LeafLabel::Activity(label),
                None => LeafLabel::Tau,
            },
        }
    }

    /// Activity label, `None` for silent leaves
    pub fn label(&self) -> Option<&str> {
        match &self.activity_label {
            LeafLabel::Activity(a) => Some(a),
            LeafLabel::Tau => None,
        }
    }
}
