use core::ops::{Add, BitAnd, BitOr, Div, Mul, Not, Sub};

use super::Node;

impl<Rhs: Into<Node>> Add<Rhs> for Node {
    type Output = Node;

    fn add(self, rhs: Rhs) -> Node {
        Node::Add(Box::new(self), Box::new(rhs.into()))
    }
}

impl<Rhs: Into<Node>> Sub<Rhs> for Node {
    type Output = Node;

    fn sub(self, rhs: Rhs) -> Node {
        Node::Sub(Box::new(self), Box::new(rhs.into()))
    }
}

impl<Rhs: Into<Node>> Mul<Rhs> for Node {
    type Output = Node;

    fn mul(self, rhs: Rhs) -> Node {
        Node::Mul(Box::new(self), Box::new(rhs.into()))
    }
}

impl<Rhs: Into<Node>> Div<Rhs> for Node {
    type Output = Node;

    fn div(self, rhs: Rhs) -> Node {
        Node::Div(Box::new(self), Box::new(rhs.into()))
    }
}

impl Not for Node {
    type Output = Node;

    fn not(self) -> Node {
        Node::Not(Box::new(self))
    }
}

impl BitAnd<Node> for Node {
    type Output = Node;

    fn bitand(self, rhs: Node) -> Node {
        match self {
            Node::And(mut inputs) => {
                inputs.push(rhs);
                Node::And(inputs)
            }
            lhs => Node::And(vec![lhs, rhs]),
        }
    }
}

impl BitOr<Node> for Node {
    type Output = Node;

    fn bitor(self, rhs: Node) -> Node {
        self.or(rhs)
    }
}
