//! Retail tariff models mapping the EPEX spot price to buy and sell rates.

use std::{fmt, str::FromStr};

use crate::{
    error::Error,
    quantity::rate::{KilowattHourRate, MegawattHourRate},
};

/// Dutch VAT multiplier.
const VAT: f64 = 1.21;

/// Energy tax plus procurement markup, €/kWh ex VAT.
const ENERGY_MARKUP: f64 = 0.10154;

/// Supplier purchase fee, €/kWh incl VAT.
const PURCHASE_FEE: f64 = 0.0248;

/// Fixed buy/sell rate pair, used by the no-battery baselines.
#[derive(Copy, Clone, Debug)]
pub struct FixedTariff {
    pub buy: KilowattHourRate,
    pub sell: KilowattHourRate,
}

#[derive(Clone, Debug)]
pub enum Tariff {
    /// Net-metering: exported energy earns the full retail buy rate.
    StandardSaldering,

    /// Retail buy rate; export earns the spot price plus the fee ex VAT.
    StandardNoSaldering,

    /// The bare spot price on both sides.
    Bare,

    /// A fixed rate pair, independent of the spot price.
    Fixed(FixedTariff),

    /// User-supplied buy and sell formulas over `epex`.
    Custom { buy: Formula, sell: Formula },
}

impl Tariff {
    pub fn buy(&self, epex: MegawattHourRate) -> KilowattHourRate {
        match self {
            Self::StandardSaldering | Self::StandardNoSaldering => retail_buy(epex),
            Self::Bare => epex.per_kilowatt_hour(),
            Self::Fixed(fixed) => fixed.buy,
            Self::Custom { buy, .. } => KilowattHourRate(buy.eval(epex.0)),
        }
    }

    pub fn sell(&self, epex: MegawattHourRate) -> KilowattHourRate {
        match self {
            Self::StandardSaldering => retail_buy(epex),
            Self::StandardNoSaldering => {
                KilowattHourRate(epex.per_kilowatt_hour().0 + PURCHASE_FEE / VAT)
            }
            Self::Bare => epex.per_kilowatt_hour(),
            Self::Fixed(fixed) => fixed.sell,
            Self::Custom { sell, .. } => KilowattHourRate(sell.eval(epex.0)),
        }
    }
}

fn retail_buy(epex: MegawattHourRate) -> KilowattHourRate {
    KilowattHourRate((epex.per_kilowatt_hour().0 + ENERGY_MARKUP) * VAT + PURCHASE_FEE)
}

/// Restricted arithmetic formula over the `epex` spot price.
///
/// Formulas arrive as free-form user input, so they are evaluated by a tiny
/// expression interpreter: numbers, `epex`, `+ - * /`, unary minus, and
/// parentheses. No host state, no calls, no I/O.
#[derive(Clone)]
pub struct Formula {
    source: String,
    expression: Expr,
}

impl Formula {
    /// Evaluate with `epex` in €/MWh; the result is in €/kWh.
    pub fn eval(&self, epex: f64) -> f64 {
        self.expression.eval(epex)
    }
}

impl FromStr for Formula {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { tokens: tokenize(source)?, position: 0 };
        let expression = parser.expression()?;
        if parser.position != parser.tokens.len() {
            return Err(Error::invalid(format!("unexpected trailing input in `{source}`")));
        }
        Ok(Self { source: source.to_owned(), expression })
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.source)
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Formula({})", self.source)
    }
}

#[derive(Clone)]
enum Expr {
    Number(f64),
    Epex,
    Negate(Box<Expr>),
    Binary(Operator, Box<Expr>, Box<Expr>),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Expr {
    fn eval(&self, epex: f64) -> f64 {
        match self {
            Self::Number(value) => *value,
            Self::Epex => epex,
            Self::Negate(inner) => -inner.eval(epex),
            Self::Binary(operator, lhs, rhs) => {
                let (lhs, rhs) = (lhs.eval(epex), rhs.eval(epex));
                match operator {
                    Operator::Add => lhs + rhs,
                    Operator::Subtract => lhs - rhs,
                    Operator::Multiply => lhs * rhs,
                    Operator::Divide => lhs / rhs,
                }
            }
        }
    }
}

#[derive(Clone, PartialEq)]
enum Token {
    Number(f64),
    Epex,
    Operator(Operator),
    OpenParen,
    CloseParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((start, char)) = chars.next() {
        match char {
            char if char.is_whitespace() => {}
            '+' => tokens.push(Token::Operator(Operator::Add)),
            '-' => tokens.push(Token::Operator(Operator::Subtract)),
            '*' => tokens.push(Token::Operator(Operator::Multiply)),
            '/' => tokens.push(Token::Operator(Operator::Divide)),
            '(' => tokens.push(Token::OpenParen),
            ')' => tokens.push(Token::CloseParen),
            char if char.is_ascii_digit() || char == '.' => {
                let mut end = start + char.len_utf8();
                while let Some((index, next)) = chars.peek().copied() {
                    if next.is_ascii_digit() || next == '.' {
                        end = index + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &source[start..end];
                let value = literal
                    .parse()
                    .map_err(|_| Error::invalid(format!("malformed number `{literal}`")))?;
                tokens.push(Token::Number(value));
            }
            char if char.is_ascii_alphabetic() => {
                let mut end = start + char.len_utf8();
                while let Some((index, next)) = chars.peek().copied() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = index + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                match &source[start..end] {
                    "epex" => tokens.push(Token::Epex),
                    other => {
                        return Err(Error::invalid(format!("unknown identifier `{other}`")));
                    }
                }
            }
            other => {
                return Err(Error::invalid(format!("unexpected character `{other}`")));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.term()?;
        while let Some(&Token::Operator(operator @ (Operator::Add | Operator::Subtract))) =
            self.peek()
        {
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary(operator, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.factor()?;
        while let Some(&Token::Operator(operator @ (Operator::Multiply | Operator::Divide))) =
            self.peek()
        {
            self.advance();
            let rhs = self.factor()?;
            lhs = Expr::Binary(operator, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, Error> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Epex) => Ok(Expr::Epex),
            Some(Token::Operator(Operator::Subtract)) => {
                Ok(Expr::Negate(Box::new(self.factor()?)))
            }
            Some(Token::OpenParen) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::CloseParen) => Ok(inner),
                    _ => Err(Error::invalid("unbalanced parenthesis")),
                }
            }
            _ => Err(Error::invalid("expected a number, `epex`, or `(`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn preset_buy_matches_formula() {
        let epex = MegawattHourRate(120.0);
        let buy = Tariff::StandardSaldering.buy(epex);
        assert_abs_diff_eq!(buy.0, (120.0 / 1000.0 + 0.10154) * 1.21 + 0.0248, epsilon = 1e-12);
    }

    #[test]
    fn saldering_sells_at_buy_rate() {
        let epex = MegawattHourRate(-15.0);
        let tariff = Tariff::StandardSaldering;
        assert_eq!(tariff.buy(epex), tariff.sell(epex));
    }

    #[test]
    fn no_saldering_sell_excludes_vat_on_fee() {
        let epex = MegawattHourRate(80.0);
        let sell = Tariff::StandardNoSaldering.sell(epex);
        assert_abs_diff_eq!(sell.0, 0.08 + 0.0248 / 1.21, epsilon = 1e-12);
    }

    #[test]
    fn bare_is_the_spot_price() {
        let epex = MegawattHourRate(50.0);
        assert_eq!(Tariff::Bare.buy(epex), KilowattHourRate(0.05));
        assert_eq!(Tariff::Bare.sell(epex), KilowattHourRate(0.05));
    }

    #[test]
    fn formula_precedence() {
        let formula: Formula = "1 + 2 * 3".parse().unwrap();
        assert_abs_diff_eq!(formula.eval(0.0), 7.0);
    }

    #[test]
    fn formula_parentheses_and_unary_minus() {
        let formula: Formula = "-(epex / 1000 + 0.02) * 1.21".parse().unwrap();
        assert_abs_diff_eq!(formula.eval(100.0), -(0.1 + 0.02) * 1.21, epsilon = 1e-12);
    }

    #[test]
    fn formula_replicates_saldering() {
        let formula: Formula = "(epex / 1000 + 0.10154) * 1.21 + 0.0248".parse().unwrap();
        let tariff = Tariff::Custom { buy: formula.clone(), sell: formula };
        let epex = MegawattHourRate(200.0);
        assert_abs_diff_eq!(
            tariff.buy(epex).0,
            Tariff::StandardSaldering.buy(epex).0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn formula_rejects_unknown_identifier() {
        assert!("price * 2".parse::<Formula>().is_err());
    }

    #[test]
    fn formula_rejects_trailing_garbage() {
        assert!("1 + 2 )".parse::<Formula>().is_err());
    }
}
