use crate::tensor::Tensor;
use std::fmt;

impl Tensor {
    pub fn print(&self) {
        println!("{self}");
    }
}

// 逐通道打印，每个通道是一个`rows x cols`的矩阵
impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [rows, cols, depth] = self.shape();
        for d in 0..depth {
            writeln!(f, "通道{d}:")?;
            for r in 0..rows {
                write!(f, "[")?;
                for c in 0..cols {
                    write!(f, "{:8.4}", self.data[(r, c, d)])?;
                    if c != cols - 1 {
                        write!(f, ", ")?;
                    }
                }
                writeln!(f, "]")?;
            }
        }
        writeln!(f, "形状: {:?}", self.shape())
    }
}
