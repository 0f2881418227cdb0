use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A width x height grid of independently addressable atomic counters.
///
/// Accumulation passes share one grid across all workers; every cell is a
/// lock-free read-modify-write, so no region ownership or locking is
/// needed. Decrements only ever undo increments previously issued for the
/// same trajectory, so cells never go below zero.
///
/// Cells are 32 bits wide. At extreme sample budgets (hundreds of billions
/// of hits concentrating on few pixels) a cell can overflow; callers sizing
/// such passes should split them across grids. Aggregate reads widen to
/// u64.
#[derive(Debug)]
pub struct CountGrid {
    width: u32,
    height: u32,
    cells: Vec<AtomicU32>,
}

impl CountGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let mut cells = Vec::new();
        cells.resize_with((width * height) as usize, AtomicU32::default);
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (x + y * self.width) as usize
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.cells[self.index(x, y)].load(Ordering::Relaxed)
    }

    pub fn set(&self, x: u32, y: u32, value: u32) {
        self.cells[self.index(x, y)].store(value, Ordering::Relaxed);
    }

    pub fn increment(&self, x: u32, y: u32) {
        self.cells[self.index(x, y)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self, x: u32, y: u32) {
        self.cells[self.index(x, y)].fetch_sub(1, Ordering::Relaxed);
    }

    /// Sum of all cells. Only meaningful once the workers writing to the
    /// grid have stopped.
    pub fn total(&self) -> u64 {
        self.cells
            .iter()
            .map(|c| c.load(Ordering::Relaxed) as u64)
            .sum()
    }

    pub fn max(&self) -> u32 {
        self.cells
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .max()
            .unwrap_or(0)
    }

    /// Row-major snapshot of the cells.
    pub fn to_vec(&self) -> Vec<u32> {
        self.cells
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }
}

/// The floating-point counterpart of [`CountGrid`], for weighted
/// accumulation. f64 cells are emulated with compare-exchange loops over
/// their bit patterns; there is no hardware float fetch-add.
#[derive(Debug)]
pub struct DensityGrid {
    width: u32,
    height: u32,
    cells: Vec<AtomicU64>,
}

impl DensityGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let mut cells = Vec::new();
        cells.resize_with((width * height) as usize, AtomicU64::default);
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (x + y * self.width) as usize
    }

    pub fn get(&self, x: u32, y: u32) -> f64 {
        f64::from_bits(self.cells[self.index(x, y)].load(Ordering::Relaxed))
    }

    pub fn set(&self, x: u32, y: u32, value: f64) {
        self.cells[self.index(x, y)].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn add(&self, x: u32, y: u32, value: f64) {
        let cell = &self.cells[self.index(x, y)];
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}
