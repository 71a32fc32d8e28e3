/// A named, row-major `f32` tensor, the unit in which model state is exported and imported.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }

    /// Returns the amount of elements the shape describes.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}
