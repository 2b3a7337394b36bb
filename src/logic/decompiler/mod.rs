pub mod codegen;
pub mod printer;
