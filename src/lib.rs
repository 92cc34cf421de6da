//! # digit-trie
//!
//! Tracks which fixed-width decimal identifiers (e.g. extensions in a national
//! numbering plan) are already allocated, and enumerates the remaining free
//! identifiers in priority order: most-used branches are drained first so that
//! consumed allocations concentrate and large contiguous free blocks survive.
//!
//! The trie is an uncompressed radix-10 tree. Free space below digits that
//! never got a node is never materialized; the enumerator emits those ranges
//! as zero-padded blocks straight from the cached accounting fields.
//!
//! ## Example
//!
//! ```rust
//! use digit_trie::DigitTrie;
//!
//! let mut trie = DigitTrie::from_identifiers(["1", "2", "3", "4"]).unwrap();
//! assert!(trie.contains("3").unwrap());
//!
//! let free: Vec<String> = trie.available(None).unwrap().collect();
//! assert_eq!(free, ["5", "6", "7", "8", "9"]);
//! ```

use std::cmp::Reverse;
use std::fmt;

use thiserror::Error;

// =============================================================================
// Configuration
// =============================================================================

/// Longest identifier length the accounting pass supports: `covers` of the
/// root is `10^L` and must fit in a `u64`.
pub const MAX_IDENTIFIER_LEN: usize = 19;

const DIGITS: usize = 10;

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by trie operations.
///
/// Every error is a deterministic function of the input; none are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A non-digit character was hit while resolving a branching digit.
    #[error("identifier {identifier:?} has a non-digit character at position {position}")]
    MalformedIdentifier { identifier: String, position: usize },

    /// The identifier does not extend past the path already matched.
    #[error("identifier {identifier:?} does not extend past the matched prefix")]
    NotExtending { identifier: String },

    /// A terminal node's prefix length disagrees with the accounting length.
    #[error("terminal prefix {prefix:?} does not fit accounting length {expected}")]
    LengthMismatch { prefix: String, expected: usize },

    /// Accounting length exceeds what the cached `covers` field can represent.
    #[error("identifier length {0} exceeds the supported maximum of {max}", max = MAX_IDENTIFIER_LEN)]
    UnsupportedLength(usize),

    /// Availability was requested on an empty trie without a seed to derive
    /// the identifier length from.
    #[error("trie is empty and no seed was provided to derive the identifier length")]
    NoLength,
}

#[inline]
fn check_digits(identifier: &str) -> Result<(), Error> {
    if let Some(position) = identifier.bytes().position(|b| !b.is_ascii_digit()) {
        return Err(Error::MalformedIdentifier {
            identifier: identifier.to_owned(),
            position,
        });
    }
    Ok(())
}

// =============================================================================
// Node handles
// =============================================================================

/// Arena handle. `NIL` marks an absent child.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct NodeId(u32);

impl NodeId {
    const NIL: NodeId = NodeId(u32::MAX);
    const ROOT: NodeId = NodeId(0);

    #[inline]
    fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// One trie node. The root has the empty prefix; every other node's prefix is
/// its parent's prefix plus exactly one digit.
#[derive(Debug, Clone)]
pub struct Node {
    prefix: String,
    children: [NodeId; DIGITS],
    terminal: bool,
    /// Registered identifiers reachable below (and at) this node. Valid only
    /// immediately after [`DigitTrie::populate_used`].
    used: u64,
    /// Full-length identifiers reachable below this node, `10^(L - depth)`.
    /// Valid only immediately after [`DigitTrie::populate_used`].
    covers: u64,
}

impl Node {
    fn new(prefix: String) -> Self {
        Self {
            prefix,
            children: [NodeId::NIL; DIGITS],
            terminal: false,
            used: 0,
            covers: 0,
        }
    }

    /// Digit string leading from the root to this node.
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True iff this prefix was explicitly inserted as a complete identifier.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    #[inline]
    pub fn used(&self) -> u64 {
        self.used
    }

    #[inline]
    pub fn covers(&self) -> u64 {
        self.covers
    }

    #[inline]
    fn has_children(&self) -> bool {
        self.children.iter().any(|c| !c.is_nil())
    }
}

// =============================================================================
// DigitTrie
// =============================================================================

/// Digit-trie allocator over a fixed-length decimal keyspace.
///
/// Nodes live in an arena and are created on demand along insertion paths,
/// never deleted. Children always get a larger arena index than their parent,
/// so a reverse index scan visits children before parents; the accounting
/// pass relies on this instead of recursing.
pub struct DigitTrie {
    nodes: Vec<Node>,
    /// Number of registered (terminal) identifiers.
    count: usize,
}

impl DigitTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(String::new())],
            count: 0,
        }
    }

    /// Builds a trie from a collection of already-used identifiers.
    pub fn from_identifiers<I, S>(identifiers: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self::new();
        for identifier in identifiers {
            trie.insert(identifier.as_ref())?;
        }
        Ok(trie)
    }

    /// Number of registered identifiers.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Registers `identifier` as used. Idempotent on duplicates.
    ///
    /// One node per digit is created along the insertion path as needed.
    /// Rejects non-digit input and the empty string (the root can never be a
    /// registered identifier).
    pub fn insert(&mut self, identifier: &str) -> Result<(), Error> {
        check_digits(identifier)?;
        if identifier.is_empty() {
            return Err(Error::NotExtending {
                identifier: String::new(),
            });
        }

        let mut cur = NodeId::ROOT;
        for depth in 0..identifier.len() {
            let digit = (identifier.as_bytes()[depth] - b'0') as usize;
            let child = self.nodes[cur.idx()].children[digit];
            cur = if child.is_nil() {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Node::new(identifier[..depth + 1].to_owned()));
                self.nodes[cur.idx()].children[digit] = id;
                id
            } else {
                child
            };
        }

        let node = &mut self.nodes[cur.idx()];
        if !node.terminal {
            node.terminal = true;
            self.count += 1;
        }
        Ok(())
    }

    /// Looks up an exact identifier, walking one digit per level.
    ///
    /// Returns `Some` only when the full path exists and the final node is
    /// terminal; a prefix that merely has descendants is not found.
    pub fn lookup(&self, identifier: &str) -> Result<Option<&Node>, Error> {
        check_digits(identifier)?;

        let mut cur = NodeId::ROOT;
        for &b in identifier.as_bytes() {
            let digit = (b - b'0') as usize;
            let child = self.nodes[cur.idx()].children[digit];
            if child.is_nil() {
                return Ok(None);
            }
            cur = child;
        }
        let node = &self.nodes[cur.idx()];
        Ok(node.terminal.then_some(node))
    }

    /// True iff `identifier` was registered.
    pub fn contains(&self, identifier: &str) -> Result<bool, Error> {
        Ok(self.lookup(identifier)?.is_some())
    }

    /// Recomputes the cached `used`/`covers` fields for accounting length
    /// `identifier_len`.
    ///
    /// Full post-order recomputation on every call; the cached fields are
    /// invalid after any structural mutation until this runs again. Fails if
    /// any terminal node's prefix length differs from `identifier_len`.
    pub fn populate_used(&mut self, identifier_len: usize) -> Result<(), Error> {
        if identifier_len > MAX_IDENTIFIER_LEN {
            return Err(Error::UnsupportedLength(identifier_len));
        }

        // Children always follow their parent in the arena, so a reverse scan
        // is a post-order traversal.
        for idx in (0..self.nodes.len()).rev() {
            let depth = self.nodes[idx].prefix.len();
            let terminal = self.nodes[idx].terminal;
            if terminal && depth != identifier_len {
                return Err(Error::LengthMismatch {
                    prefix: self.nodes[idx].prefix.clone(),
                    expected: identifier_len,
                });
            }
            let Some(height) = identifier_len.checked_sub(depth) else {
                // Non-terminal node deeper than the accounting length; the
                // identifier that created it is longer than `identifier_len`.
                return Err(Error::LengthMismatch {
                    prefix: self.nodes[idx].prefix.clone(),
                    expected: identifier_len,
                });
            };

            let children = self.nodes[idx].children;
            let mut used = u64::from(terminal);
            for child in children {
                if !child.is_nil() {
                    used += self.nodes[child.idx()].used;
                }
            }

            let node = &mut self.nodes[idx];
            node.used = used;
            node.covers = 10u64.pow(height as u32);
        }
        Ok(())
    }

    /// Lazy pre-order traversal over all nodes, ascending digit at each level.
    ///
    /// Compose with [`Iterator::filter`] to select nodes by predicate.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            trie: self,
            stack: vec![NodeId::ROOT],
        }
    }

    /// Enumerates the free identifiers of the trie's accounting length, each
    /// exactly once, most-used branches first.
    ///
    /// On an empty trie, `seed` is required: it is registered as used and its
    /// length becomes the accounting length, so the seed itself is never
    /// reported free. On a non-empty trie the length is taken from the
    /// registered identifiers and `seed` plays no role.
    ///
    /// Runs a full accounting pass up front; it fails here if the registered
    /// identifiers do not share one length. Enumeration itself is incremental
    /// and may be dropped early without visiting unexplored branches.
    pub fn available(&mut self, seed: Option<&str>) -> Result<Available<'_>, Error> {
        let identifier_len = if self.is_empty() {
            let seed = seed.ok_or(Error::NoLength)?;
            self.insert(seed)?;
            seed.len()
        } else {
            self.walk()
                .find(|node| node.is_terminal())
                .map(|node| node.prefix().len())
                .ok_or(Error::NoLength)?
        };
        self.populate_used(identifier_len)?;

        let mut stack = Vec::new();
        if self.nodes[NodeId::ROOT.idx()].has_children() {
            stack.push(Frame::enter(self, NodeId::ROOT));
        }
        Ok(Available { trie: self, stack })
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.nodes[id.idx()];
        let kids: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|c| !c.is_nil())
            .collect();

        if node.terminal {
            write!(f, "{}(terminal)", node.prefix)?;
        }
        match kids.len() {
            0 => Ok(()),
            // Single-child chains collapse into the child's rendering.
            1 if !node.terminal => self.fmt_node(kids[0], f),
            _ => {
                if !node.terminal {
                    f.write_str(&node.prefix)?;
                }
                f.write_str("(")?;
                for (i, kid) in kids.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    self.fmt_node(*kid, f)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Default for DigitTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// Compact rendering: terminal nodes as `prefix(terminal)`, single-child
/// chains collapsed, siblings in ascending digit order.
impl fmt::Display for DigitTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(NodeId::ROOT, f)
    }
}

impl fmt::Debug for DigitTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitTrie")
            .field("len", &self.count)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

// =============================================================================
// Pre-order traversal
// =============================================================================

pub struct Walk<'a> {
    trie: &'a DigitTrie,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let id = self.stack.pop()?;
        let node = &self.trie.nodes[id.idx()];
        for digit in (0..DIGITS).rev() {
            let child = node.children[digit];
            if !child.is_nil() {
                self.stack.push(child);
            }
        }
        Some(node)
    }
}

// =============================================================================
// Availability enumeration
// =============================================================================

/// An unmaterialized free block below an absent digit, emitted in ascending
/// zero-padded index order.
struct BlockRun {
    digit: u8,
    next: u64,
    size: u64,
    /// Pad width of the index suffix; `size == 10^width`.
    width: usize,
}

/// Suspended position inside one node: first its children in priority order,
/// then the free blocks under its absent digits, ascending.
struct Frame {
    node: NodeId,
    /// Digits with an explicit child, ordered by `used` descending, ties by
    /// ascending digit. Never empty: frames are only created for nodes with
    /// at least one child.
    order: Vec<u8>,
    pos: usize,
    gap: u8,
    run: Option<BlockRun>,
}

impl Frame {
    fn enter(trie: &DigitTrie, id: NodeId) -> Frame {
        let node = &trie.nodes[id.idx()];
        let mut order: Vec<u8> = (0..DIGITS as u8)
            .filter(|&d| !node.children[d as usize].is_nil())
            .collect();
        order.sort_by_key(|&d| {
            let child = node.children[d as usize];
            (Reverse(trie.nodes[child.idx()].used), d)
        });
        Frame {
            node: id,
            order,
            pos: 0,
            gap: 0,
            run: None,
        }
    }
}

/// Lazy stream of free identifiers. See [`DigitTrie::available`].
pub struct Available<'a> {
    trie: &'a DigitTrie,
    stack: Vec<Frame>,
}

impl<'a> Iterator for Available<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let trie = self.trie;
        loop {
            let frame = self.stack.last_mut()?;
            let node = &trie.nodes[frame.node.idx()];

            // A block in progress is drained before anything else.
            if let Some(run) = frame.run.as_mut() {
                if run.next < run.size {
                    let value = format!(
                        "{}{}{:0width$}",
                        node.prefix,
                        run.digit,
                        run.next,
                        width = run.width
                    );
                    run.next += 1;
                    return Some(value);
                }
                frame.run = None;
                frame.gap += 1;
                continue;
            }

            // Phase 1: drain explicit children, most used first.
            if frame.pos < frame.order.len() {
                let digit = frame.order[frame.pos];
                frame.pos += 1;
                let child = node.children[digit as usize];
                // Childless nodes contribute nothing: either a used
                // full-length leaf or unreachable.
                if trie.nodes[child.idx()].has_children() {
                    let next = Frame::enter(trie, child);
                    self.stack.push(next);
                }
                continue;
            }

            // Phase 2: free blocks under absent digits, ascending.
            if frame.gap as usize >= DIGITS {
                self.stack.pop();
                continue;
            }
            let digit = frame.gap;
            if !node.children[digit as usize].is_nil() {
                frame.gap += 1;
                continue;
            }
            if node.prefix.is_empty() && digit == 0 {
                // Identifiers never start with a leading zero.
                frame.gap += 1;
                continue;
            }

            // Siblings share `covers`; any existing child gives the block size.
            let sibling = node.children[frame.order[0] as usize];
            let block = trie.nodes[sibling.idx()].covers;
            if block == 1 {
                frame.gap += 1;
                return Some(format!("{}{}", node.prefix, digit));
            }
            frame.run = Some(BlockRun {
                digit,
                next: 0,
                size: block,
                width: block.ilog10() as usize,
            });
        }
    }
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod proptests;
