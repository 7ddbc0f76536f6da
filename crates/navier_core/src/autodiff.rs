use std::cell::RefCell;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Reverse Mode AD tape (Wengert list).
/// Every node stores up to two parents together with the local partial
/// derivative of the node with respect to that parent.
#[derive(Debug, Default)]
pub struct Tape {
    nodes: RefCell<Vec<Node>>,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    parents: [(usize, f64); 2],
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an independent input.
    pub fn var(&self, value: f64) -> Var<'_> {
        let index = self.len();
        self.push(Node {
            parents: [(index, 0.0), (index, 0.0)],
        });
        Var {
            tape: self,
            index,
            value,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, node: Node) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(node);
        nodes.len() - 1
    }

    fn unary(&self, value: f64, parent: usize, weight: f64) -> Var<'_> {
        let index = self.push(Node {
            parents: [(parent, weight), (parent, 0.0)],
        });
        Var {
            tape: self,
            index,
            value,
        }
    }

    fn binary(&self, value: f64, lhs: (usize, f64), rhs: (usize, f64)) -> Var<'_> {
        let index = self.push(Node { parents: [lhs, rhs] });
        Var {
            tape: self,
            index,
            value,
        }
    }
}

/// A value recorded on a [`Tape`].
#[derive(Debug, Clone, Copy)]
pub struct Var<'t> {
    tape: &'t Tape,
    index: usize,
    value: f64,
}

impl<'t> Var<'t> {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn powf(self, n: f64) -> Self {
        let weight = n * self.value.powf(n - 1.0);
        self.tape.unary(self.value.powf(n), self.index, weight)
    }

    pub fn powi(self, n: i32) -> Self {
        let weight = (n as f64) * self.value.powi(n - 1);
        self.tape.unary(self.value.powi(n), self.index, weight)
    }

    /// Seeds the adjoint of `self` with one and sweeps the tape backwards.
    pub fn gradients(&self) -> Gradients {
        let nodes = self.tape.nodes.borrow();
        let mut adjoints = vec![0.0; self.index + 1];
        adjoints[self.index] = 1.0;

        for i in (0..=self.index).rev() {
            let adjoint = adjoints[i];
            if adjoint == 0.0 {
                continue;
            }
            for &(parent, weight) in &nodes[i].parents {
                if parent != i {
                    adjoints[parent] += weight * adjoint;
                }
            }
        }

        Gradients { adjoints }
    }
}

/// Adjoints produced by [`Var::gradients`].
#[derive(Debug, Clone)]
pub struct Gradients {
    adjoints: Vec<f64>,
}

impl Gradients {
    /// Partial derivative of the output with respect to `var`.
    /// Inputs recorded after the output have no influence on it.
    pub fn wrt(&self, var: &Var<'_>) -> f64 {
        self.adjoints.get(var.index).copied().unwrap_or(0.0)
    }
}

impl<'t> Add for Var<'t> {
    type Output = Var<'t>;
    fn add(self, rhs: Self) -> Self::Output {
        self.tape
            .binary(self.value + rhs.value, (self.index, 1.0), (rhs.index, 1.0))
    }
}

impl<'t> Sub for Var<'t> {
    type Output = Var<'t>;
    fn sub(self, rhs: Self) -> Self::Output {
        self.tape
            .binary(self.value - rhs.value, (self.index, 1.0), (rhs.index, -1.0))
    }
}

impl<'t> Mul for Var<'t> {
    type Output = Var<'t>;
    fn mul(self, rhs: Self) -> Self::Output {
        self.tape.binary(
            self.value * rhs.value,
            (self.index, rhs.value),
            (rhs.index, self.value),
        )
    }
}

impl<'t> Div for Var<'t> {
    type Output = Var<'t>;
    fn div(self, rhs: Self) -> Self::Output {
        let denom = rhs.value * rhs.value;
        self.tape.binary(
            self.value / rhs.value,
            (self.index, 1.0 / rhs.value),
            (rhs.index, -self.value / denom),
        )
    }
}

impl<'t> Neg for Var<'t> {
    type Output = Var<'t>;
    fn neg(self) -> Self::Output {
        self.tape.unary(-self.value, self.index, -1.0)
    }
}

// Mixed arithmetic with plain constants.

impl<'t> Add<f64> for Var<'t> {
    type Output = Var<'t>;
    fn add(self, rhs: f64) -> Self::Output {
        self.tape.unary(self.value + rhs, self.index, 1.0)
    }
}

impl<'t> Add<Var<'t>> for f64 {
    type Output = Var<'t>;
    fn add(self, rhs: Var<'t>) -> Self::Output {
        rhs + self
    }
}

impl<'t> Sub<f64> for Var<'t> {
    type Output = Var<'t>;
    fn sub(self, rhs: f64) -> Self::Output {
        self.tape.unary(self.value - rhs, self.index, 1.0)
    }
}

impl<'t> Sub<Var<'t>> for f64 {
    type Output = Var<'t>;
    fn sub(self, rhs: Var<'t>) -> Self::Output {
        rhs.tape.unary(self - rhs.value, rhs.index, -1.0)
    }
}

impl<'t> Mul<f64> for Var<'t> {
    type Output = Var<'t>;
    fn mul(self, rhs: f64) -> Self::Output {
        self.tape.unary(self.value * rhs, self.index, rhs)
    }
}

impl<'t> Mul<Var<'t>> for f64 {
    type Output = Var<'t>;
    fn mul(self, rhs: Var<'t>) -> Self::Output {
        rhs * self
    }
}

impl<'t> Div<f64> for Var<'t> {
    type Output = Var<'t>;
    fn div(self, rhs: f64) -> Self::Output {
        self.tape.unary(self.value / rhs, self.index, 1.0 / rhs)
    }
}

impl<'t> Div<Var<'t>> for f64 {
    type Output = Var<'t>;
    fn div(self, rhs: Var<'t>) -> Self::Output {
        let weight = -self / (rhs.value * rhs.value);
        rhs.tape.unary(self / rhs.value, rhs.index, weight)
    }
}
