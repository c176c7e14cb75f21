//! Robust random cut tree
//!
//! A full binary tree of randomized axis-aligned cuts. Nodes live in an arena
//! owned by the tree and refer to each other by [`NodeId`]; a label index maps
//! every label to the leaf that holds it. Coincident points share one leaf
//! whose multiplicity is the number of labels folded into it.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bbox::BoundingBox;
use crate::errors::{RcfError, Result};

/// Opaque point identifier, unique within one tree
pub type Label = usize;

/// Index of a node in the tree's arena
///
/// Handles are invalidated by [`RandomCutTree::delete`], which compacts the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Terminal node holding one point and every label folded onto it
#[derive(Debug, Clone)]
pub struct Leaf {
    point: Vec<f64>,
    labels: Vec<Label>,
    parent: Option<NodeId>,
}

impl Leaf {
    pub fn point(&self) -> &[f64] {
        &self.point
    }

    /// First label inserted at this leaf
    pub fn label(&self) -> Label {
        self.labels[0]
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Number of coincident points collapsed into this leaf
    pub fn multiplicity(&self) -> usize {
        self.labels.len()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Internal node: a cut and the box of everything below it
#[derive(Debug, Clone)]
pub struct Branch {
    left: NodeId,
    right: NodeId,
    cut_dimension: usize,
    cut_value: f64,
    bounding_box: BoundingBox,
    leaf_count: usize,
    parent: Option<NodeId>,
}

impl Branch {
    pub fn left(&self) -> NodeId {
        self.left
    }

    pub fn right(&self) -> NodeId {
        self.right
    }

    pub fn cut_dimension(&self) -> usize {
        self.cut_dimension
    }

    pub fn cut_value(&self) -> f64 {
        self.cut_value
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child a point is routed to (`<=` goes left)
    fn route(&self, point: &[f64]) -> NodeId {
        if point[self.cut_dimension] <= self.cut_value {
            self.left
        } else {
            self.right
        }
    }

    /// The child of this branch that is not `child`
    fn sibling_of(&self, child: NodeId) -> NodeId {
        if self.left == child {
            self.right
        } else {
            self.left
        }
    }

    fn replace_child(&mut self, old: NodeId, new: NodeId) {
        if self.left == old {
            self.left = new;
        } else if self.right == old {
            self.right = new;
        }
    }
}

/// A tree node (leaf or branch)
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(Leaf),
    Branch(Branch),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Leaves count as their multiplicity
    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.multiplicity(),
            Node::Branch(branch) => branch.leaf_count,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Branch(branch) => branch.parent,
        }
    }

    fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Branch(branch) => branch.parent = parent,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Node::Leaf(leaf) => BoundingBox::from_point(&leaf.point),
            Node::Branch(branch) => branch.bounding_box.clone(),
        }
    }

    /// `(min, max)` of the node's box along `dimension`
    fn bounds(&self, dimension: usize) -> (f64, f64) {
        match self {
            Node::Leaf(leaf) => (leaf.point[dimension], leaf.point[dimension]),
            Node::Branch(branch) => (
                branch.bounding_box.min()[dimension],
                branch.bounding_box.max()[dimension],
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Robust random cut tree over points of a fixed dimension
#[derive(Debug, Clone)]
pub struct RandomCutTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    leaves: HashMap<Label, NodeId>,
    dimension: Option<usize>,
    rng: StdRng,
}

impl Default for RandomCutTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomCutTree {
    /// Empty tree with an entropy-seeded generator
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Empty tree with a reproducible generator
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            leaves: HashMap::new(),
            dimension: None,
            rng,
        }
    }

    /// Build a tree over `points`, tagging point `i` with `labels[i]`
    pub fn build(points: &[Vec<f64>], labels: &[Label], seed: u64) -> Result<Self> {
        if points.len() != labels.len() {
            return Err(RcfError::InvalidArgument(format!(
                "{} points but {} labels",
                points.len(),
                labels.len()
            )));
        }

        let mut tree = Self::with_seed(seed);
        if points.is_empty() {
            return Ok(tree);
        }

        let dimension = points[0].len();
        for point in points {
            check_point(point, dimension)?;
        }
        for &label in labels {
            if tree.leaves.insert(label, NodeId(0)).is_some() {
                return Err(RcfError::DuplicateLabel(label));
            }
        }

        tree.dimension = Some(dimension);
        tree.nodes.reserve(2 * points.len());
        let indices: Vec<usize> = (0..points.len()).collect();
        let root = tree.build_node(points, labels, &indices, None);
        tree.root = Some(root);

        Ok(tree)
    }

    /// Recursively build the subtree over `indices`
    fn build_node(
        &mut self,
        points: &[Vec<f64>],
        labels: &[Label],
        indices: &[usize],
        parent: Option<NodeId>,
    ) -> NodeId {
        let current = NodeId(self.nodes.len());

        let bbox = BoundingBox::from_points(indices.iter().map(|&i| points[i].as_slice()));
        let cut = bbox.as_ref().and_then(|b| b.sample_cut(&mut self.rng));

        // Identical coordinates (or a single point) fold into one leaf
        let (Some(bounding_box), Some((cut_dimension, cut_value))) = (bbox, cut) else {
            let leaf_labels: Vec<Label> = indices.iter().map(|&i| labels[i]).collect();
            for &label in &leaf_labels {
                self.leaves.insert(label, current);
            }
            self.nodes.push(Node::Leaf(Leaf {
                point: points[indices[0]].clone(),
                labels: leaf_labels,
                parent,
            }));
            return current;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| points[i][cut_dimension] <= cut_value);

        // Reserve the slot, children are patched in below
        self.nodes.push(Node::Branch(Branch {
            left: current,
            right: current,
            cut_dimension,
            cut_value,
            bounding_box,
            leaf_count: indices.len(),
            parent,
        }));

        let left = self.build_node(points, labels, &left_indices, Some(current));
        let right = self.build_node(points, labels, &right_indices, Some(current));

        if let Node::Branch(branch) = &mut self.nodes[current.0] {
            branch.left = left;
            branch.right = right;
        }

        current
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Dimension of stored points, `None` while the tree is empty
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Total leaf count at the root (multiplicities included)
    pub fn leaf_count(&self) -> usize {
        self.root.map_or(0, |root| self.nodes[root.0].leaf_count())
    }

    /// Number of labels held by the tree
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn contains(&self, label: Label) -> bool {
        self.leaves.contains_key(&label)
    }

    /// Labels held by the tree, in no particular order
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.leaves.keys().copied()
    }

    /// Box of the whole tree
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.root.map(|root| self.nodes[root.0].bounding_box())
    }

    /// Leaf holding `label`
    pub fn leaf(&self, label: Label) -> Result<&Leaf> {
        let id = self.leaf_id(label)?;
        match &self.nodes[id.0] {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Branch(_) => Err(RcfError::LabelNotFound(label)),
        }
    }

    fn leaf_id(&self, label: Label) -> Result<NodeId> {
        self.leaves
            .get(&label)
            .copied()
            .ok_or(RcfError::LabelNotFound(label))
    }

    /// Number of branches between `label`'s leaf and the root
    pub fn depth(&self, label: Label) -> Result<usize> {
        let mut node = self.leaf_id(label)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[node.0].parent() {
            depth += 1;
            node = parent;
        }
        Ok(depth)
    }

    /// Descend by cuts to the leaf a point would be routed to
    pub fn query(&self, point: &[f64]) -> Result<Option<NodeId>> {
        let Some(mut node) = self.root else {
            return Ok(None);
        };
        if let Some(dimension) = self.dimension {
            check_point(point, dimension)?;
        }
        while let Node::Branch(branch) = &self.nodes[node.0] {
            node = branch.route(point);
        }
        Ok(Some(node))
    }

    /// Leaf holding exactly `point`, if any
    pub fn find_duplicate(&self, point: &[f64]) -> Result<Option<NodeId>> {
        Ok(self.query(point)?.filter(|id| match &self.nodes[id.0] {
            Node::Leaf(leaf) => leaf.point == point,
            Node::Branch(_) => false,
        }))
    }

    /// Insert a point under a new label and return its leaf
    pub fn insert(&mut self, point: Vec<f64>, label: Label) -> Result<NodeId> {
        if self.leaves.contains_key(&label) {
            return Err(RcfError::DuplicateLabel(label));
        }
        let dimension = self.dimension.unwrap_or(point.len());
        check_point(&point, dimension)?;

        let Some(root) = self.root else {
            let id = self.push(Node::Leaf(Leaf {
                point,
                labels: vec![label],
                parent: None,
            }));
            self.root = Some(id);
            self.dimension = Some(dimension);
            self.leaves.insert(label, id);
            return Ok(id);
        };

        if let Some(id) = self.find_duplicate(&point)? {
            if let Node::Leaf(leaf) = &mut self.nodes[id.0] {
                leaf.labels.push(label);
            }
            self.leaves.insert(label, id);
            self.adjust_counts(self.nodes[id.0].parent(), 1);
            return Ok(id);
        }

        let mut node = root;
        let (node, side, cut_dimension, cut_value) = loop {
            let bbox = self.nodes[node.0].bounding_box();
            let (cut_dimension, cut_value) = bbox
                .expanded(&point)
                .sample_cut(&mut self.rng)
                .ok_or_else(|| {
                    RcfError::InvalidArgument("cannot cut a degenerate box".to_string())
                })?;

            let (lo, hi) = self.nodes[node.0].bounds(cut_dimension);
            if cut_value < lo {
                break (node, Side::Left, cut_dimension, cut_value);
            }
            if cut_value >= hi {
                break (node, Side::Right, cut_dimension, cut_value);
            }

            match &self.nodes[node.0] {
                Node::Branch(branch) => node = branch.route(&point),
                // A leaf box has lo == hi, so one of the checks above always holds
                Node::Leaf(_) => {
                    return Err(RcfError::InvalidArgument(
                        "cut did not separate point from leaf".to_string(),
                    ))
                }
            }
        };

        let parent = self.nodes[node.0].parent();
        let mut bounding_box = self.nodes[node.0].bounding_box();
        bounding_box.extend(&point);
        let leaf_count = self.nodes[node.0].leaf_count() + 1;

        let leaf = self.push(Node::Leaf(Leaf {
            point: point.clone(),
            labels: vec![label],
            parent: None,
        }));
        let (left, right) = match side {
            Side::Left => (leaf, node),
            Side::Right => (node, leaf),
        };
        let branch = self.push(Node::Branch(Branch {
            left,
            right,
            cut_dimension,
            cut_value,
            bounding_box,
            leaf_count,
            parent,
        }));

        self.nodes[leaf.0].set_parent(Some(branch));
        self.nodes[node.0].set_parent(Some(branch));
        self.replace_in_parent(parent, node, branch);
        self.leaves.insert(label, leaf);

        let mut ancestor = parent;
        while let Some(id) = ancestor {
            if let Node::Branch(b) = &mut self.nodes[id.0] {
                b.bounding_box.extend(&point);
                b.leaf_count += 1;
            }
            ancestor = self.nodes[id.0].parent();
        }

        Ok(leaf)
    }

    /// Remove `label` from the tree and return its point
    pub fn delete(&mut self, label: Label) -> Result<Vec<f64>> {
        let leaf_id = self.leaf_id(label)?;
        let (point, parent, multiplicity) = match &mut self.nodes[leaf_id.0] {
            Node::Leaf(leaf) => {
                leaf.labels.retain(|&l| l != label);
                (leaf.point.clone(), leaf.parent, leaf.labels.len() + 1)
            }
            Node::Branch(_) => return Err(RcfError::LabelNotFound(label)),
        };
        self.leaves.remove(&label);

        if multiplicity > 1 {
            self.adjust_counts(parent, -1);
            return Ok(point);
        }

        let Some(parent) = parent else {
            self.remove_slot(leaf_id);
            self.root = None;
            self.dimension = None;
            return Ok(point);
        };

        let (sibling, grandparent) = match &self.nodes[parent.0] {
            Node::Branch(branch) => (branch.sibling_of(leaf_id), branch.parent),
            Node::Leaf(_) => return Err(RcfError::LabelNotFound(label)),
        };
        self.nodes[sibling.0].set_parent(grandparent);
        self.replace_in_parent(grandparent, parent, sibling);

        let mut ancestor = grandparent;
        while let Some(id) = ancestor {
            let bbox = match &self.nodes[id.0] {
                Node::Branch(b) => self.nodes[b.left.0]
                    .bounding_box()
                    .union(&self.nodes[b.right.0].bounding_box()),
                Node::Leaf(_) => break,
            };
            if let Node::Branch(b) = &mut self.nodes[id.0] {
                b.bounding_box = bbox;
                b.leaf_count -= 1;
            }
            ancestor = self.nodes[id.0].parent();
        }

        // Higher slot first so the lower one is not moved underneath us
        let (first, second) = if leaf_id > parent {
            (leaf_id, parent)
        } else {
            (parent, leaf_id)
        };
        self.remove_slot(first);
        self.remove_slot(second);

        Ok(point)
    }

    /// Size of the sibling subtree freed by removing `label`'s leaf
    pub fn displacement(&self, label: Label) -> Result<usize> {
        let leaf = self.leaf_id(label)?;
        Ok(match self.nodes[leaf.0].parent() {
            Some(parent) => match &self.nodes[parent.0] {
                Node::Branch(branch) => self.nodes[branch.sibling_of(leaf).0].leaf_count(),
                Node::Leaf(_) => 0,
            },
            None => 0,
        })
    }

    /// Collusive displacement of `label`.
    ///
    /// Maximum over every ancestor of `sibling_size / same_side_size`, where the
    /// same side includes the leaf itself. A lone root leaf scores zero.
    pub fn codisp(&self, label: Label) -> Result<f64> {
        let mut node = self.leaf_id(label)?;
        let mut score = 0.0_f64;

        while let Some(parent) = self.nodes[node.0].parent() {
            if let Node::Branch(branch) = &self.nodes[parent.0] {
                let sibling = self.nodes[branch.sibling_of(node).0].leaf_count();
                let same_side = self.nodes[node.0].leaf_count();
                score = score.max(sibling as f64 / same_side as f64);
            }
            node = parent;
        }

        Ok(score)
    }

    /// Codisp of every label held by the tree
    pub fn codisp_all(&self) -> Result<Vec<(Label, f64)>> {
        self.leaves
            .keys()
            .map(|&label| Ok((label, self.codisp(label)?)))
            .collect()
    }

    /// Check every structural invariant of the tree
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some(root) = self.root else {
            if !self.nodes.is_empty() || !self.leaves.is_empty() {
                return Err("Empty tree has dangling nodes or labels".to_string());
            }
            return Ok(());
        };

        if self.nodes[root.0].parent().is_some() {
            return Err(format!("Root {} has a parent", root.0));
        }

        let mut visited = 0usize;
        let mut labels = 0usize;
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            visited += 1;
            if visited > self.nodes.len() {
                return Err("Cycle detected in tree".to_string());
            }

            match &self.nodes[id.0] {
                Node::Leaf(leaf) => {
                    if leaf.labels.is_empty() {
                        return Err(format!("Leaf {} holds no labels", id.0));
                    }
                    for label in &leaf.labels {
                        if self.leaves.get(label) != Some(&id) {
                            return Err(format!(
                                "Label {} is not indexed to leaf {}",
                                label, id.0
                            ));
                        }
                    }
                    labels += leaf.labels.len();
                }
                Node::Branch(branch) => {
                    let (left, right) = (&self.nodes[branch.left.0], &self.nodes[branch.right.0]);

                    if branch.left == branch.right {
                        return Err(format!("Branch {} has a single child", id.0));
                    }
                    if left.parent() != Some(id) || right.parent() != Some(id) {
                        return Err(format!("Children of branch {} have stale parents", id.0));
                    }
                    if branch.leaf_count != left.leaf_count() + right.leaf_count() {
                        return Err(format!(
                            "Branch {} leaf count {} != {} + {}",
                            id.0,
                            branch.leaf_count,
                            left.leaf_count(),
                            right.leaf_count()
                        ));
                    }
                    let union = left.bounding_box().union(&right.bounding_box());
                    if branch.bounding_box != union {
                        return Err(format!(
                            "Branch {} box is not the union of its children",
                            id.0
                        ));
                    }
                    let k = branch.cut_dimension;
                    if left.bounds(k).1 > branch.cut_value || right.bounds(k).0 <= branch.cut_value
                    {
                        return Err(format!(
                            "Branch {} children straddle cut {} on dimension {}",
                            id.0, branch.cut_value, k
                        ));
                    }
                    stack.push(branch.left);
                    stack.push(branch.right);
                }
            }
        }

        if visited != self.nodes.len() {
            return Err(format!(
                "{} nodes reachable but arena holds {}",
                visited,
                self.nodes.len()
            ));
        }
        if labels != self.leaves.len() {
            return Err(format!(
                "{} labels in leaves but index holds {}",
                labels,
                self.leaves.len()
            ));
        }
        Ok(())
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn replace_in_parent(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        match parent {
            Some(parent) => {
                if let Node::Branch(branch) = &mut self.nodes[parent.0] {
                    branch.replace_child(old, new);
                }
            }
            None => self.root = Some(new),
        }
    }

    /// Add `delta` to the leaf count of `start` and every ancestor above it
    fn adjust_counts(&mut self, start: Option<NodeId>, delta: isize) {
        let mut ancestor = start;
        while let Some(id) = ancestor {
            if let Node::Branch(branch) = &mut self.nodes[id.0] {
                branch.leaf_count = branch.leaf_count.saturating_add_signed(delta);
            }
            ancestor = self.nodes[id.0].parent();
        }
    }

    /// Drop a detached node, moving the last node into its slot
    fn remove_slot(&mut self, id: NodeId) {
        let last = NodeId(self.nodes.len() - 1);
        self.nodes.swap_remove(id.0);
        if id == last {
            return;
        }

        // `last` now lives at `id`; repoint everything that referred to it
        let parent = self.nodes[id.0].parent();
        self.replace_in_parent(parent, last, id);
        match &self.nodes[id.0] {
            Node::Branch(branch) => {
                let (left, right) = (branch.left, branch.right);
                self.nodes[left.0].set_parent(Some(id));
                self.nodes[right.0].set_parent(Some(id));
            }
            Node::Leaf(leaf) => {
                for label in &leaf.labels {
                    self.leaves.insert(*label, id);
                }
            }
        }
    }
}

fn check_point(point: &[f64], dimension: usize) -> Result<()> {
    if point.len() != dimension {
        return Err(RcfError::InvalidArgument(format!(
            "point has dimension {}, expected {}",
            point.len(),
            dimension
        )));
    }
    if dimension == 0 {
        return Err(RcfError::InvalidArgument(
            "points must have at least one dimension".to_string(),
        ));
    }
    if point.iter().any(|x| !x.is_finite()) {
        return Err(RcfError::InvalidArgument(
            "point has a non-finite coordinate".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points() -> (Vec<Vec<f64>>, Vec<Label>) {
        let points: Vec<Vec<f64>> = (0..16)
            .map(|i| vec![(i % 4) as f64, (i / 4) as f64])
            .collect();
        let labels = (0..points.len()).collect();
        (points, labels)
    }

    #[test]
    fn test_build_invariants() {
        let (points, labels) = grid_points();
        let tree = RandomCutTree::build(&points, &labels, 42).unwrap();

        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.leaf_count(), 16);
        assert_eq!(tree.len(), 16);
        assert_eq!(tree.dimension(), Some(2));
        // 16 leaves and 15 branches in a full binary tree
        assert_eq!(tree.nodes.len(), 31);

        let bbox = tree.bounding_box().unwrap();
        assert_eq!(bbox.min(), &[0.0, 0.0]);
        assert_eq!(bbox.max(), &[3.0, 3.0]);
    }

    #[test]
    fn test_build_folds_duplicates() {
        let points = vec![vec![1.0, 1.0]; 5];
        let labels: Vec<Label> = (10..15).collect();
        let tree = RandomCutTree::build(&points, &labels, 1).unwrap();

        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.leaf_count(), 5);
        assert_eq!(tree.leaf(12).unwrap().multiplicity(), 5);
        assert_eq!(tree.codisp(12).unwrap(), 0.0);
        assert_eq!(tree.displacement(12).unwrap(), 0);
    }

    #[test]
    fn test_build_rejects_bad_input() {
        let points = vec![vec![0.0], vec![1.0]];
        assert!(matches!(
            RandomCutTree::build(&points, &[3, 3], 0),
            Err(RcfError::DuplicateLabel(3))
        ));
        assert!(matches!(
            RandomCutTree::build(&points, &[1], 0),
            Err(RcfError::InvalidArgument(_))
        ));
        let ragged = vec![vec![0.0], vec![1.0, 2.0]];
        assert!(RandomCutTree::build(&ragged, &[0, 1], 0).is_err());
        let nan = vec![vec![0.0], vec![f64::NAN]];
        assert!(RandomCutTree::build(&nan, &[0, 1], 0).is_err());
    }

    #[test]
    fn test_seeded_build_is_reproducible() {
        let (points, labels) = grid_points();
        let a = RandomCutTree::build(&points, &labels, 9).unwrap();
        let b = RandomCutTree::build(&points, &labels, 9).unwrap();

        for label in labels {
            assert_eq!(a.codisp(label).unwrap(), b.codisp(label).unwrap());
            assert_eq!(a.depth(label).unwrap(), b.depth(label).unwrap());
        }
    }

    #[test]
    fn test_insert_into_empty_and_duplicate_label() {
        let mut tree = RandomCutTree::with_seed(5);
        let root = tree.insert(vec![1.0, 2.0], 0).unwrap();
        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.leaf_count(), 1);

        assert!(matches!(
            tree.insert(vec![3.0, 4.0], 0),
            Err(RcfError::DuplicateLabel(0))
        ));
        assert!(matches!(
            tree.insert(vec![3.0], 1),
            Err(RcfError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_insert_maintains_invariants() {
        let (points, labels) = grid_points();
        let mut tree = RandomCutTree::build(&points, &labels, 3).unwrap();

        tree.insert(vec![10.0, -4.0], 100).unwrap();
        tree.insert(vec![1.5, 1.5], 101).unwrap();
        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.leaf_count(), 18);

        let bbox = tree.bounding_box().unwrap();
        assert_eq!(bbox.min(), &[0.0, -4.0]);
        assert_eq!(bbox.max(), &[10.0, 3.0]);
    }

    #[test]
    fn test_insert_duplicate_point_folds() {
        let (points, labels) = grid_points();
        let mut tree = RandomCutTree::build(&points, &labels, 3).unwrap();
        let original = tree.leaves[&5];

        let id = tree.insert(points[5].clone(), 50).unwrap();
        assert_eq!(id, original);
        assert_eq!(tree.leaf(50).unwrap().multiplicity(), 2);
        assert_eq!(tree.leaf_count(), 17);
        assert_eq!(tree.validate(), Ok(()));

        tree.delete(5).unwrap();
        assert_eq!(tree.leaf(50).unwrap().multiplicity(), 1);
        assert_eq!(tree.leaf(50).unwrap().label(), 50);
        assert_eq!(tree.leaf_count(), 16);
        assert_eq!(tree.validate(), Ok(()));
    }

    #[test]
    fn test_delete_until_empty() {
        let (points, labels) = grid_points();
        let mut tree = RandomCutTree::build(&points, &labels, 8).unwrap();

        for label in labels {
            let point = tree.delete(label).unwrap();
            assert_eq!(point, points[label]);
            assert_eq!(tree.validate(), Ok(()));
        }
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.dimension(), None);
        assert!(matches!(tree.delete(0), Err(RcfError::LabelNotFound(0))));
    }

    #[test]
    fn test_displacement_and_codisp_on_isolated_point() {
        let mut points: Vec<Vec<f64>> = (0..9).map(|i| vec![i as f64 * 0.01]).collect();
        points.push(vec![1000.0]);
        let labels: Vec<Label> = (0..10).collect();
        let tree = RandomCutTree::build(&points, &labels, 17).unwrap();

        // The far point is almost surely cut off first
        assert_eq!(tree.depth(9).unwrap(), 1);
        assert_eq!(tree.displacement(9).unwrap(), 9);
        assert_eq!(tree.codisp(9).unwrap(), 9.0);

        for label in 0..9 {
            assert!(tree.codisp(label).unwrap() < 9.0);
        }
    }

    #[test]
    fn test_codisp_two_points() {
        let tree = RandomCutTree::build(&[vec![0.0], vec![1.0]], &[0, 1], 0).unwrap();
        assert_eq!(tree.codisp(0).unwrap(), 1.0);
        assert_eq!(tree.displacement(1).unwrap(), 1);
        assert!(matches!(tree.codisp(7), Err(RcfError::LabelNotFound(7))));
    }

    #[test]
    fn test_extreme_coordinates() {
        let points = vec![vec![-1e308], vec![1e308], vec![0.0]];
        let mut tree = RandomCutTree::build(&points, &[0, 1, 2], 1).unwrap();
        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.leaf_count(), 3);

        tree.insert(vec![-1.5e308], 3).unwrap();
        tree.insert(vec![1.7e308], 4).unwrap();
        assert_eq!(tree.validate(), Ok(()));
        assert_eq!(tree.delete(1).unwrap(), vec![1e308]);
        assert_eq!(tree.validate(), Ok(()));

        for label in [0, 2, 3, 4] {
            assert!(tree.codisp(label).unwrap().is_finite());
        }
    }

    #[test]
    fn test_codisp_all_covers_every_label() {
        let (points, labels) = grid_points();
        let tree = RandomCutTree::build(&points, &labels, 4).unwrap();

        let mut scores = tree.codisp_all().unwrap();
        scores.sort_by_key(|&(label, _)| label);
        assert_eq!(scores.len(), 16);
        for (label, score) in scores {
            assert_eq!(score, tree.codisp(label).unwrap());
        }
    }

    #[test]
    fn test_query_routes_to_duplicate() {
        let (points, labels) = grid_points();
        let tree = RandomCutTree::build(&points, &labels, 21).unwrap();

        let found = tree.find_duplicate(&points[7]).unwrap().unwrap();
        assert_eq!(tree.leaves[&7], found);
        assert!(tree.find_duplicate(&[0.5, 0.5]).unwrap().is_none());
        assert!(tree.query(&[1.0]).is_err());
    }
}
