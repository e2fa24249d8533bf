use crate::solver::{Model, Solution, SolverError, VarType};
use good_lp::Variable;
use std::ops::Range;

type Result<T> = std::result::Result<T, SolverError>;

pub trait AddVars {
    type Out;

    /// Create a variable with a closure
    fn vars_with<F: FnMut(Self) -> Result<Variable>>(&self, func: F) -> Result<Self::Out>
    where
        Self: Sized;

    /// Create a variable for any type, with bounds `[bounds.start, bounds.end]`
    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>) -> Result<Self::Out>;

    /// Binary variables
    fn binary(&self, model: &mut Model, base_name: &str) -> Result<Self::Out> {
        self.vars(model, base_name, VarType::Binary, &(0.0..1.0))
    }
}

impl AddVars for usize {
    type Out = Vec<Variable>;

    fn vars_with<F: FnMut(Self) -> Result<Variable>>(&self, mut func: F) -> Result<Self::Out>
    where
        Self: Sized,
    {
        let mut vec = Vec::with_capacity(*self);
        for i in 0..*self {
            vec.push(func(i)?);
        }

        Ok(vec)
    }

    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>) -> Result<Self::Out> {
        let mut vec = Vec::with_capacity(*self);
        for i in 0..*self {
            vec.push(model.add_var(&format!("{}_{}", base_name, i), vtype, bounds.start, bounds.end)?);
        }

        Ok(vec)
    }
}

impl AddVars for (usize, usize) {
    type Out = Vec<<usize as AddVars>::Out>;

    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>) -> Result<Self::Out> {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push(self.1.vars(model, &format!("{}_{}", base_name, i), vtype, bounds)?)
        }

        Ok(out)
    }

    fn vars_with<F: FnMut(Self) -> Result<Variable>>(&self, mut func: F) -> Result<Self::Out>
    where
        Self: Sized,
    {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push(self.1.vars_with(|j| func((i, j)))?);
        }

        Ok(out)
    }
}

impl AddVars for (usize, usize, usize) {
    type Out = Vec<<(usize, usize) as AddVars>::Out>;

    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>) -> Result<Self::Out> {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push((self.1, self.2).vars(model, &format!("{}_{}", base_name, i), vtype, bounds)?)
        }

        Ok(out)
    }

    fn vars_with<F: FnMut(Self) -> Result<Variable>>(&self, mut func: F) -> Result<Self::Out>
    where
        Self: Sized,
    {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push((self.1, self.2).vars_with(|(j, k)| func((i, j, k)))?)
        }

        Ok(out)
    }
}

impl AddVars for (usize, usize, usize, usize) {
    type Out = Vec<<(usize, usize, usize) as AddVars>::Out>;

    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>) -> Result<Self::Out> {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push((self.1, self.2, self.3).vars(model, &format!("{}_{}", base_name, i), vtype, bounds)?)
        }

        Ok(out)
    }

    fn vars_with<F: FnMut(Self) -> Result<Variable>>(&self, mut func: F) -> Result<Self::Out>
    where
        Self: Sized,
    {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push((self.1, self.2, self.3).vars_with(|(j, k, l)| func((i, j, k, l)))?)
        }

        Ok(out)
    }
}

impl AddVars for (usize, usize, usize, usize, usize) {
    type Out = Vec<<(usize, usize, usize, usize) as AddVars>::Out>;

    fn vars(&self, model: &mut Model, base_name: &str, vtype: VarType, bounds: &Range<f64>) -> Result<Self::Out> {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push((self.1, self.2, self.3, self.4).vars(
                model,
                &format!("{}_{}", base_name, i),
                vtype,
                bounds,
            )?)
        }

        Ok(out)
    }

    fn vars_with<F: FnMut(Self) -> Result<Variable>>(&self, mut func: F) -> Result<Self::Out>
    where
        Self: Sized,
    {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push((self.1, self.2, self.3, self.4).vars_with(|(j, k, l, m)| func((i, j, k, l, m)))?)
        }

        Ok(out)
    }
}

/// Trait that converts solver variables to their values in a solution
pub trait ConvertVars {
    type Out;
    fn convert(&self, solution: &Solution) -> Self::Out;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, solution: &Solution) -> Self::Out {
        self.iter().map(|e| e.convert(solution)).collect()
    }
}

impl ConvertVars for Variable {
    type Out = f64;

    fn convert(&self, solution: &Solution) -> Self::Out {
        solution.value(*self)
    }
}
