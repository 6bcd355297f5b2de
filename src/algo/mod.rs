mod td_lambda;

pub use td_lambda::{TdLambda, TdLambdaConfig};
