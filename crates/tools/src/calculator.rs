use async_trait::async_trait;
use boardroom_common::{Result, Tool, ToolContext, ToolDefinition, parse_args};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Exponentiate,
    Factorial,
    IsPrime,
    SquareRoot,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Exponentiate,
        Operation::Factorial,
        Operation::IsPrime,
        Operation::SquareRoot,
    ];

    pub fn tool_name(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Exponentiate => "exponentiate",
            Operation::Factorial => "factorial",
            Operation::IsPrime => "is_prime",
            Operation::SquareRoot => "square_root",
        }
    }

    /// Label reported in the `operation` field of the result.
    fn label(&self) -> &'static str {
        match self {
            Operation::Add => "addition",
            Operation::Subtract => "subtraction",
            Operation::Multiply => "multiplication",
            Operation::Divide => "division",
            Operation::Exponentiate => "exponentiation",
            Operation::Factorial => "factorial",
            Operation::IsPrime => "prime_check",
            Operation::SquareRoot => "square_root",
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct BinaryArgs {
    /// First number
    a: f64,
    /// Second number
    b: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IntegerArg {
    /// The integer to operate on
    n: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NumberArg {
    /// The number to operate on
    n: f64,
}

fn error(message: &str) -> Value {
    json!({ "error": message })
}

fn number(op: Operation, result: f64) -> Value {
    if result.is_finite() {
        json!({ "operation": op.label(), "result": result })
    } else {
        error("Result is not a finite number")
    }
}

/// Largest `n` whose factorial is finite as an `f64`.
const MAX_FINITE_FACTORIAL: i64 = 170;

fn factorial(n: i64) -> Value {
    if n < 0 {
        return error("Factorial of a negative number is undefined");
    }
    if n > MAX_FINITE_FACTORIAL {
        return error("Result is not a finite number");
    }
    let exact = (1..=n as u64).try_fold(1u64, |acc, k| acc.checked_mul(k));
    match exact {
        Some(result) => json!({ "operation": "factorial", "result": result }),
        None => number(Operation::Factorial, (1..=n).map(|k| k as f64).product()),
    }
}

fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3i64;
    while d.saturating_mul(d) <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Evaluate `op` on JSON arguments. Bad input is reported in the result, not raised.
pub fn evaluate(op: Operation, args: Value) -> Result<Value> {
    let value = match op {
        Operation::Add
        | Operation::Subtract
        | Operation::Multiply
        | Operation::Divide
        | Operation::Exponentiate => {
            let BinaryArgs { a, b } = parse_args(op.tool_name(), args)?;
            match op {
                Operation::Add => number(op, a + b),
                Operation::Subtract => number(op, a - b),
                Operation::Multiply => number(op, a * b),
                Operation::Divide if b == 0.0 => error("Division by zero is undefined"),
                Operation::Divide => number(op, a / b),
                _ => number(op, a.powf(b)),
            }
        }
        Operation::Factorial => factorial(parse_args::<IntegerArg>(op.tool_name(), args)?.n),
        Operation::IsPrime => {
            let n = parse_args::<IntegerArg>(op.tool_name(), args)?.n;
            json!({ "operation": op.label(), "result": is_prime(n) })
        }
        Operation::SquareRoot => {
            let n = parse_args::<NumberArg>(op.tool_name(), args)?.n;
            if n < 0.0 {
                error("Square root of a negative number is undefined")
            } else {
                number(op, n.sqrt())
            }
        }
    };
    Ok(value)
}

pub struct CalculatorTool {
    op: Operation,
}

impl CalculatorTool {
    pub fn new(op: Operation) -> Self {
        Self { op }
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        let name = self.op.tool_name();
        let description = match self.op {
            Operation::Add => "Add two numbers and return the result.",
            Operation::Subtract => {
                "Subtract the second number from the first and return the result."
            }
            Operation::Multiply => "Multiply two numbers and return the result.",
            Operation::Divide => "Divide the first number by the second and return the result.",
            Operation::Exponentiate => {
                "Raise the first number to the power of the second and return the result."
            }
            Operation::Factorial => "Calculate the factorial of a number.",
            Operation::IsPrime => "Check if a number is prime.",
            Operation::SquareRoot => "Calculate the square root of a number.",
        };
        match self.op {
            Operation::Factorial | Operation::IsPrime => {
                ToolDefinition::new::<IntegerArg>(name, description)
            }
            Operation::SquareRoot => ToolDefinition::new::<NumberArg>(name, description),
            _ => ToolDefinition::new::<BinaryArgs>(name, description),
        }
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        Ok(evaluate(self.op, args)?.to_string())
    }
}
