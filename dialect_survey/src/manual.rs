/*!

This is the long-form manual for `dialect_survey` and `dialectapp`.

## Input tables

The survey is made of four tables, each read from its own file:

* `users`: `id`, `year` (birth year), `gender`, `state`, `language`
* `questions`: `id`, `text`
* `choices`: `id`, `question_id`, `value`
* `responses`: `id`, `user_id`, `question_id`, `choice_id`, `other`

Empty cells are missing values. A response may have no choice, in which case
its free text (`other`) is used.

## Terms

The term of a response is the value of its choice if there is one, otherwise
its free text. It is trimmed and lower-cased, then the normalization rules are
tried in order. The first rule whose pattern matches rewrites the term.
The default rule folds the spellings of "roly poly":

```text
(?i)^(roly|rollie|rolly|roley)[\s\-]*poly.*$  ->  roly poly
```

Responses without any term are ignored by the analyses.

## The quiz

Ten questions, one answer each. Each answer is a feature `{question}_{choice}`.
The weight table gives, for some features, a weight to some regions. The score
of a region is the sum of the weights of the chosen features plus 0.5. The
region with the highest score is the prediction (the first region in the table
wins ties), and the confidence is its share of the total score.

The weights are a hand-made approximation and should not be read as the
coefficients of a real model. A different table can be given as JSON:

```json
{
  "regions": ["The West", "The South"],
  "smoothing": 0.5,
  "weights": {"319_freeway": {"The West": 2.3}}
}
```

The smoothing must be a positive number and the weights must not be negative.

## Analyses

### `usage`

For one question, the share of each term among the respondents of each birth
decade (1987 is in the decade 1980). The five most frequent terms are
reported unless a list of terms is given.

### `diversity`

For one question and a set of terms (by default `soda` and `pop`), the
Shannon entropy of the terms used in each state:
`H = -sum(p * log2(p))`. One term only gives 0, two terms used equally give 1.
Without `--min-year`, `--max-year` or `--gender`, the filter spans all the
birth years of the respondents and all the genders, so respondents without a
birth year or a gender are left out. Terms are folded like the answers
(`Rolly-Poly` selects `roly poly`).
A state without any response after filtering by birth year and gender has no
entropy.

### `cohorts`

For one question, the age of each respondent (current year minus birth year)
puts them in one of seven groups:

| group                | age      |
|----------------------|----------|
| Gen Z (Under 18)     | < 18     |
| Gen Z (18–24)        | 18 to 24 |
| Millennial (25–34)   | 25 to 34 |
| Millennial (35–44)   | 35 to 44 |
| Gen X (45–54)        | 45 to 54 |
| Boomer (55–64)       | 55 to 64 |
| Boomer (65+)         | 65 and more |

Terms given by less than 5% of the respondents are dropped, then each group
reports the share of each remaining term. The overall distribution of the
remaining terms is reported too.
*/
