//! Solver-independent linear program: variables with bounds and objective
//! coefficients plus constraint rows, held in memory and handed to the
//! backend in one piece. Nothing outside this module names the solver.

use std::ops::Index;

use crate::error::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Maximize,
    Minimize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Relation {
    Equal,
    LessOrEqual,
    GreaterOrEqual,
}

/// Handle into a [`LinearProgram`]'s column space.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VariableId(usize);

struct Column {
    objective: f64,
    lower: f64,
    upper: f64,
}

struct Row {
    terms: Vec<(VariableId, f64)>,
    relation: Relation,
    rhs: f64,
}

pub struct LinearProgram {
    direction: Direction,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl LinearProgram {
    pub const fn new(direction: Direction) -> Self {
        Self { direction, columns: Vec::new(), rows: Vec::new() }
    }

    pub fn add_variable(&mut self, objective: f64, lower: f64, upper: f64) -> VariableId {
        self.columns.push(Column { objective, lower, upper });
        VariableId(self.columns.len() - 1)
    }

    pub fn add_constraint(&mut self, terms: Vec<(VariableId, f64)>, relation: Relation, rhs: f64) {
        self.rows.push(Row { terms, relation, rhs });
    }

    pub fn solve(&self) -> Result<Solution, Error> {
        let direction = match self.direction {
            Direction::Maximize => minilp::OptimizationDirection::Maximize,
            Direction::Minimize => minilp::OptimizationDirection::Minimize,
        };
        let mut problem = minilp::Problem::new(direction);
        let variables: Vec<minilp::Variable> = self
            .columns
            .iter()
            .map(|column| problem.add_var(column.objective, (column.lower, column.upper)))
            .collect();
        for row in &self.rows {
            let terms: Vec<(minilp::Variable, f64)> = row
                .terms
                .iter()
                .map(|(variable, coefficient)| (variables[variable.0], *coefficient))
                .collect();
            let relation = match row.relation {
                Relation::Equal => minilp::ComparisonOp::Eq,
                Relation::LessOrEqual => minilp::ComparisonOp::Le,
                Relation::GreaterOrEqual => minilp::ComparisonOp::Ge,
            };
            problem.add_constraint(terms.as_slice(), relation, row.rhs);
        }
        let solution = problem.solve().map_err(|error| Error::Solver(error.to_string()))?;
        Ok(Solution {
            objective: solution.objective(),
            values: variables.iter().map(|variable| solution[*variable]).collect(),
            status: SolveStatus::Optimal,
        })
    }
}

/// Whether the backend proved optimality or merely returned a feasible point.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SolveStatus {
    Optimal,
    Feasible,
}

pub struct Solution {
    values: Vec<f64>,
    pub objective: f64,
    pub status: SolveStatus,
}

impl Index<VariableId> for Solution {
    type Output = f64;

    fn index(&self, variable: VariableId) -> &Self::Output {
        &self.values[variable.0]
    }
}
