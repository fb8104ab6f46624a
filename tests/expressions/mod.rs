mod condition_test;
mod memory_expression_test;
