mod test_cancel;
mod test_errors;
mod test_shapes;
