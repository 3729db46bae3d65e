pub mod augmented_lagrangian;
pub mod grasp;
pub mod lbfgs;
pub mod nlp;
