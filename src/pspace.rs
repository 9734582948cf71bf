/// Private storage of one warrior, read with `LDP` and written with `STP`.
///
/// Cell 0 holds the result of the previous round and cannot be written by
/// the warrior. Values are kept modulo the core size; indices wrap modulo the
/// P-space size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PSpace {
    cells: Vec<u32>,
    core_size: u32,
}

impl PSpace {
    /// Fresh P-space. The result cell starts at -1 (no round played yet).
    pub fn new(size: u32, core_size: u32) -> Self {
        let core_size = core_size.max(1);
        let mut cells = vec![0; size.max(1) as usize];
        cells[0] = core_size - 1;
        Self { cells, core_size }
    }

    pub fn size(&self) -> u32 {
        self.cells.len() as u32
    }

    pub fn get(&self, index: u32) -> u32 {
        self.cells[(index % self.size()) as usize]
    }

    /// Store a value; writes to the result cell are ignored.
    pub fn set(&mut self, index: u32, value: u32) {
        let idx = (index % self.size()) as usize;
        if idx != 0 {
            self.cells[idx] = value % self.core_size;
        }
    }

    /// The previous round's result: 0 for a loss, otherwise the number of
    /// warriors that survived.
    pub fn last_result(&self) -> u32 {
        self.cells[0]
    }

    pub fn set_last_result(&mut self, result: u32) {
        self.cells[0] = result % self.core_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_cell_starts_at_minus_one() {
        let pspace = PSpace::new(500, 8000);
        assert_eq!(pspace.last_result(), 7999);
        assert_eq!(pspace.get(0), 7999);
        assert_eq!(pspace.get(1), 0);
    }

    #[test]
    fn test_indices_wrap_and_values_reduce() {
        let mut pspace = PSpace::new(500, 8000);
        pspace.set(501, 8003);
        assert_eq!(pspace.get(1), 3);
    }

    #[test]
    fn test_result_cell_is_read_only() {
        let mut pspace = PSpace::new(500, 8000);
        pspace.set(500, 42);
        assert_eq!(pspace.last_result(), 7999);
        pspace.set_last_result(1);
        assert_eq!(pspace.get(0), 1);
    }
}
