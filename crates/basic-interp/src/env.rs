//! The variable environment: scalars, arrays, and `DEF FN` bindings.
//!
//! Names are significant to two characters (plus type suffix) exactly as
//! Applesoft truncates them — `SCORE` and `SC` collide, `SCORE$` and
//! `SCORE` do not. Truncation happens once, at lookup time, so the AST can
//! keep carrying full-length names for error messages.

use std::collections::HashMap;

use basic_lang::TypeSuffix;

use crate::error::BasicError;
use crate::value::Value;

const SIGNIFICANT_CHARS: usize = 2;
/// Applesoft's implicit array bound: `DIM`-less arrays get subscripts
/// `0..=10` in every dimension.
const DEFAULT_ARRAY_BOUND: usize = 10;

#[must_use]
pub fn truncate_name(name: &str) -> String {
    name.chars().take(SIGNIFICANT_CHARS).collect::<String>().to_ascii_uppercase()
}

type Key = (String, TypeSuffix);

#[derive(Debug, Clone)]
pub struct Array {
    pub dims: Vec<usize>,
    pub data: Vec<Value>,
    is_string: bool,
}

impl Array {
    fn new(dims: Vec<usize>, is_string: bool) -> Self {
        let len = dims.iter().map(|d| d + 1).product::<usize>().max(1);
        Self {
            data: vec![Value::default_for(is_string); len],
            dims,
            is_string,
        }
    }

    fn flat_index(&self, subscripts: &[usize]) -> Result<usize, BasicError> {
        if subscripts.len() != self.dims.len() {
            return Err(BasicError::BadSubscript);
        }
        let mut index = 0usize;
        for (sub, bound) in subscripts.iter().zip(self.dims.iter()) {
            if *sub > *bound {
                return Err(BasicError::BadSubscript);
            }
            index = index * (*bound + 1) + *sub;
        }
        Ok(index)
    }
}

#[derive(Debug, Clone)]
pub struct FnDef {
    pub param: String,
    pub body: basic_lang::Expr,
}

#[derive(Debug, Default)]
pub struct Environment {
    scalars: HashMap<Key, Value>,
    arrays: HashMap<Key, Array>,
    functions: HashMap<String, FnDef>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.scalars.clear();
        self.arrays.clear();
        self.functions.clear();
    }

    fn key(name: &str, suffix: TypeSuffix) -> Key {
        (truncate_name(name), suffix)
    }

    #[must_use]
    pub fn get_scalar(&self, name: &str, suffix: TypeSuffix) -> Value {
        let is_string = suffix == TypeSuffix::StringDollar;
        self.scalars
            .get(&Self::key(name, suffix))
            .cloned()
            .unwrap_or_else(|| Value::default_for(is_string))
    }

    pub fn set_scalar(&mut self, name: &str, suffix: TypeSuffix, value: Value) {
        self.scalars.insert(Self::key(name, suffix), value);
    }

    /// `DIM` with explicit bounds. Re-dimensioning an already-dimensioned
    /// array is a `REDIM'D ARRAY` error; implicitly creating one via a
    /// first subscripted reference (see [`Environment::array_element`]) is
    /// not subject to that check.
    pub fn dim(&mut self, name: &str, suffix: TypeSuffix, dims: Vec<usize>) -> Result<(), BasicError> {
        let key = Self::key(name, suffix);
        if self.arrays.contains_key(&key) {
            return Err(BasicError::RedimensionedArray);
        }
        let is_string = suffix == TypeSuffix::StringDollar;
        self.arrays.insert(key, Array::new(dims, is_string));
        Ok(())
    }

    fn ensure_array(&mut self, name: &str, suffix: TypeSuffix) -> &mut Array {
        let key = Self::key(name, suffix);
        let is_string = suffix == TypeSuffix::StringDollar;
        self.arrays
            .entry(key)
            .or_insert_with(|| Array::new(vec![DEFAULT_ARRAY_BOUND], is_string))
    }

    pub fn array_element(
        &mut self,
        name: &str,
        suffix: TypeSuffix,
        subscripts: &[usize],
    ) -> Result<Value, BasicError> {
        let array = self.ensure_array(name, suffix);
        let index = array.flat_index(subscripts)?;
        Ok(array.data[index].clone())
    }

    pub fn set_array_element(
        &mut self,
        name: &str,
        suffix: TypeSuffix,
        subscripts: &[usize],
        value: Value,
    ) -> Result<(), BasicError> {
        let array = self.ensure_array(name, suffix);
        let index = array.flat_index(subscripts)?;
        array.data[index] = value;
        Ok(())
    }

    pub fn define_fn(&mut self, name: &str, param: String, body: basic_lang::Expr) {
        self.functions.insert(truncate_name(name), FnDef { param, body });
    }

    #[must_use]
    pub fn lookup_fn(&self, name: &str) -> Option<&FnDef> {
        self.functions.get(&truncate_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_names_truncate_to_two_characters() {
        let mut env = Environment::new();
        env.set_scalar("SCORE", TypeSuffix::Numeric, Value::Number(7.0));
        assert_eq!(env.get_scalar("SC", TypeSuffix::Numeric), Value::Number(7.0));
    }

    #[test]
    fn string_and_numeric_suffixes_are_independent() {
        let mut env = Environment::new();
        env.set_scalar("A", TypeSuffix::Numeric, Value::Number(1.0));
        env.set_scalar("A", TypeSuffix::StringDollar, Value::Str("HI".to_string()));
        assert_eq!(env.get_scalar("A", TypeSuffix::Numeric), Value::Number(1.0));
        assert_eq!(env.get_scalar("A", TypeSuffix::StringDollar), Value::Str("HI".to_string()));
    }

    #[test]
    fn implicit_array_gets_default_bound_of_ten() {
        let mut env = Environment::new();
        assert_eq!(
            env.array_element("A", TypeSuffix::Numeric, &[10]).unwrap(),
            Value::Number(0.0)
        );
        assert!(env.array_element("A", TypeSuffix::Numeric, &[11]).is_err());
    }

    #[test]
    fn redimensioning_is_an_error() {
        let mut env = Environment::new();
        env.dim("A", TypeSuffix::Numeric, vec![5]).unwrap();
        assert!(env.dim("A", TypeSuffix::Numeric, vec![5]).is_err());
    }

    #[test]
    fn out_of_bound_subscript_errors() {
        let mut env = Environment::new();
        env.dim("A", TypeSuffix::Numeric, vec![3]).unwrap();
        assert!(matches!(
            env.array_element("A", TypeSuffix::Numeric, &[4]),
            Err(BasicError::BadSubscript)
        ));
    }
}
