pub mod arxiv;
pub mod crossref;
pub mod pubmed;

/// Stack of open element local names, used by the streaming XML parsers.
pub(crate) type ElementPath = Vec<Vec<u8>>;

/// True when the innermost open elements equal `tail` (outermost first).
pub(crate) fn path_ends_with(path: &ElementPath, tail: &[&[u8]]) -> bool {
    if path.len() < tail.len() {
        return false;
    }
    path[path.len() - tail.len()..]
        .iter()
        .zip(tail)
        .all(|(a, b)| a.as_slice() == *b)
}

pub(crate) fn path_contains(path: &ElementPath, name: &[u8]) -> bool {
    path.iter().any(|p| p.as_slice() == name)
}
